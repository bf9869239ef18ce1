//! Report data model.
//!
//! This module defines the identifiers, lifecycle status and report contents
//! shared by the status store, the archive backends and the report pipeline.
//!
//! # Artifact Format
//!
//! A finished report is persisted as a JSON array of [`ReportEntry`] objects,
//! one per secret, in the order the secret source returned them:
//!
//! ```json
//! [
//!   {
//!     "metadata": { "id": "arn:...", "name": "db-password", "region": "us-east-1", "tags": null },
//!     "logs": [ { "userName": "alice", "action": "GetSecretValue", "time": "2024-05-01T10:00:00Z" } ]
//!   }
//! ]
//! ```
//!
//! Field names are part of the artifact contract and must not change.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier of one report-creation request.
///
/// Generated once per accepted submission and never reused. The canonical
/// textual form is the lowercase hyphenated UUID, which is also the key the
/// archive stores the report under.
///
/// # Examples
///
/// ```
/// use secretaudit_storage::ReportId;
///
/// let id = ReportId::generate();
/// let parsed: ReportId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
///
/// assert!(ReportId::parse("not-a-uuid").is_err());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(Uuid);

impl ReportId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidReportId`] if `input` is not a syntactically valid UUID.
    pub fn parse(input: &str) -> Result<Self, InvalidReportId> {
        Uuid::parse_str(input).map(Self).map_err(|_| InvalidReportId { input: input.to_owned() })
    }
}

impl FromStr for ReportId {
    type Err = InvalidReportId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for ReportId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A string that is not a valid [`ReportId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid report id: {input:?}")]
pub struct InvalidReportId {
    /// The rejected input.
    pub input: String,
}

/// Lifecycle state of a report.
///
/// Strictly monotonic: a report starts as [`Creating`](Self::Creating) and
/// moves exactly once to [`Created`](Self::Created) or
/// [`Failed`](Self::Failed), after which it never changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// The report job is queued or being processed.
    Creating,
    /// The report was assembled and persisted.
    Created,
    /// A source lookup or the persistence step failed.
    Failed,
}

impl ReportStatus {
    /// Returns `true` for [`Created`](Self::Created) and [`Failed`](Self::Failed).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Created | Self::Failed)
    }

    /// Returns `true` if a report in this state may move to `next`.
    ///
    /// The only transitions are `Creating -> Created` and `Creating -> Failed`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self == Self::Creating && next.is_terminal()
    }

    /// Returns the wire name of this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive record for one managed secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct SecretMetadata {
    /// Provider identifier of the secret (an ARN for AWS Secrets Manager).
    #[builder(into)]
    pub id: String,
    /// Human-readable secret name.
    #[builder(into)]
    pub name: String,
    /// Region the secret lives in.
    #[builder(into)]
    pub region: String,
    /// Provider tags, `None` when the secret has none.
    pub tags: Option<BTreeMap<String, String>>,
}

/// One recorded access or management event for a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct AuditEvent {
    /// Identity that performed the action.
    #[serde(rename = "userName")]
    #[builder(into)]
    pub user_name: String,
    /// The action name, e.g. `GetSecretValue`.
    #[builder(into)]
    pub action: String,
    /// When the event happened.
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
}

/// A secret together with its audit events; one per secret in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// The secret this entry describes.
    pub metadata: SecretMetadata,
    /// Audit events for the secret, in the order the audit source returned them.
    #[serde(rename = "logs")]
    pub events: Vec<AuditEvent>,
}

impl ReportEntry {
    /// Creates a report entry.
    #[must_use]
    pub fn new(metadata: SecretMetadata, events: Vec<AuditEvent>) -> Self {
        Self { metadata, events }
    }
}
