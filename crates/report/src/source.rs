//! External secret and audit source abstractions.
//!
//! The pipeline never talks to a cloud provider directly. A
//! [`SourceFactory`] turns caller [`Credentials`] into a pair of
//! [`SecretSource`] / [`AuditSource`] handles, and the worker calls those
//! handles for one report job.
//!
//! Concrete providers (AWS Secrets Manager and CloudTrail, for instance) live
//! outside this crate; tests use the fakes in `testutil`.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use secretaudit_storage::{AuditEvent, SecretMetadata};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::{ReportError, SourceError};

/// Page size a [`SecretSource`] implementation requests when listing secrets.
///
/// Only the first page is read, so a report covers at most this many secrets.
pub const MAX_SECRETS_PER_PAGE: usize = 1000;

/// Page size an [`AuditSource`] implementation requests per secret.
///
/// Only the first page is read, so an entry holds at most this many events.
pub const MAX_AUDIT_EVENTS_PER_LOOKUP: usize = 100;

/// Caller-supplied credentials for the secret and audit providers.
///
/// The secret access key and session token are wiped from memory on drop and
/// never appear in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: Zeroizing<String>,
    session_token: Option<Zeroizing<String>>,
    region: String,
}

impl Credentials {
    /// Creates credentials without a session token.
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: Zeroizing::new(secret_access_key.into()),
            session_token: None,
            region: region.into(),
        }
    }

    /// Attaches a temporary session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(Zeroizing::new(token.into()));
        self
    }

    /// The access key identifier. Safe to log.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// The session token, if any.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref().map(String::as_str)
    }

    /// The provider region, e.g. `us-east-1`.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Checks that every required field is present and the region is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.access_key_id.trim().is_empty() {
            return Err(ReportError::validation("access_key_id", "must not be empty"));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(ReportError::validation("secret_access_key", "must not be empty"));
        }
        if self.region.trim().is_empty() {
            return Err(ReportError::validation("region", "must not be empty"));
        }
        if !is_region_code(&self.region) {
            return Err(ReportError::validation(
                "region",
                format!("{:?} is not a region code like \"us-east-1\"", self.region),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("region", &self.region)
            .finish()
    }
}

/// Lowercase letters, digits and hyphens; starts with a letter, ends with a
/// digit, contains at least one hyphen.
fn is_region_code(region: &str) -> bool {
    let bytes = region.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    first.is_ascii_lowercase()
        && last.is_ascii_digit()
        && bytes.contains(&b'-')
        && bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

/// A request to create one audit report.
///
/// Deserializes from the JSON body accepted by the create-report endpoint:
///
/// ```json
/// {
///   "awsAccessKeyID": "AKIA...",
///   "awsSecretAccessKey": "...",
///   "awsSessionToken": "",
///   "awsRegion": "us-east-1"
/// }
/// ```
///
/// An empty `awsSessionToken` is treated as absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "CreateReportBody")]
pub struct CreateReportRequest {
    /// Provider credentials for this report.
    pub credentials: Credentials,
}

impl CreateReportRequest {
    /// Creates a request from credentials.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateReportBody {
    #[serde(rename = "awsAccessKeyID", default)]
    access_key_id: String,
    #[serde(rename = "awsSecretAccessKey", default)]
    secret_access_key: String,
    #[serde(rename = "awsSessionToken", default)]
    session_token: Option<String>,
    #[serde(rename = "awsRegion", default)]
    region: String,
}

impl From<CreateReportBody> for CreateReportRequest {
    fn from(body: CreateReportBody) -> Self {
        let mut credentials = Credentials::new(body.access_key_id, body.secret_access_key, body.region);
        if let Some(token) = body.session_token.filter(|t| !t.is_empty()) {
            credentials = credentials.with_session_token(token);
        }
        Self { credentials }
    }
}

/// Lists the secrets managed in one account and region.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Returns the secrets in provider order.
    ///
    /// Implementations request at most [`MAX_SECRETS_PER_PAGE`] secrets.
    async fn list_secrets(&self) -> Result<Vec<SecretMetadata>, SourceError>;
}

/// Looks up the recorded access events for a secret.
#[async_trait]
pub trait AuditSource: Send + Sync {
    /// Returns the audit events for `secret` in provider order.
    ///
    /// Implementations request at most [`MAX_AUDIT_EVENTS_PER_LOOKUP`] events.
    ///
    /// The whole metadata record is passed so a provider can key its lookup
    /// on whichever field it indexes (CloudTrail uses the secret name).
    async fn list_audit_events(&self, secret: &SecretMetadata) -> Result<Vec<AuditEvent>, SourceError>;
}

/// The source handles one report job works with.
#[derive(Clone)]
pub struct SourceHandles {
    /// Where the secrets come from.
    pub secrets: Arc<dyn SecretSource>,
    /// Where each secret's audit events come from.
    pub audit: Arc<dyn AuditSource>,
}

impl SourceHandles {
    /// Bundles a secret source and an audit source.
    pub fn new(secrets: impl SecretSource + 'static, audit: impl AuditSource + 'static) -> Self {
        Self { secrets: Arc::new(secrets), audit: Arc::new(audit) }
    }
}

impl fmt::Debug for SourceHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandles").finish_non_exhaustive()
    }
}

/// Builds source handles from caller credentials.
///
/// Called synchronously on the submit path, so implementations should only
/// construct clients, not perform network calls.
pub trait SourceFactory: Send + Sync {
    /// Creates the source handles for one report.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connect`] if a client cannot be configured.
    fn connect(&self, credentials: &Credentials) -> Result<SourceHandles, SourceError>;
}

impl<F: SourceFactory + ?Sized> SourceFactory for Arc<F> {
    fn connect(&self, credentials: &Credentials) -> Result<SourceHandles, SourceError> {
        (**self).connect(credentials)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn creds(access: &str, secret: &str, region: &str) -> Credentials {
        Credentials::new(access, secret, region)
    }

    #[rstest]
    #[case("us-east-1")]
    #[case("eu-west-3")]
    #[case("ap-southeast-2")]
    #[case("us-gov-west-1")]
    fn test_valid_regions(#[case] region: &str) {
        assert!(creds("AKIA", "s3cr3t", region).validate().is_ok());
    }

    #[rstest]
    #[case("", "s3cr3t", "us-east-1", "access_key_id")]
    #[case("   ", "s3cr3t", "us-east-1", "access_key_id")]
    #[case("AKIA", "", "us-east-1", "secret_access_key")]
    #[case("AKIA", "s3cr3t", "", "region")]
    #[case("AKIA", "s3cr3t", "US-EAST-1", "region")]
    #[case("AKIA", "s3cr3t", "useast1", "region")]
    #[case("AKIA", "s3cr3t", "us-east", "region")]
    #[case("AKIA", "s3cr3t", "1us-east-1", "region")]
    #[case("AKIA", "s3cr3t", "us_east-1", "region")]
    fn test_invalid_credentials(
        #[case] access: &str,
        #[case] secret: &str,
        #[case] region: &str,
        #[case] expected_field: &str,
    ) {
        let err = creds(access, secret, region).validate().unwrap_err();
        match err {
            ReportError::Validation { field, .. } => assert_eq!(field, expected_field),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials =
            creds("AKIAEXAMPLE", "super-secret-key", "us-east-1").with_session_token("session-xyz");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(debug.contains("us-east-1"));
        assert!(!debug.contains("super-secret-key"));
        assert!(!debug.contains("session-xyz"));
    }

    #[test]
    fn test_accessors() {
        let credentials = creds("AKIA", "key", "us-east-1").with_session_token("tok");
        assert_eq!(credentials.access_key_id(), "AKIA");
        assert_eq!(credentials.secret_access_key(), "key");
        assert_eq!(credentials.session_token(), Some("tok"));
        assert_eq!(credentials.region(), "us-east-1");
    }

    #[test]
    fn test_request_deserializes_from_endpoint_body() {
        let body = r#"{
            "awsAccessKeyID": "AKIA",
            "awsSecretAccessKey": "key",
            "awsSessionToken": "",
            "awsRegion": "eu-central-1"
        }"#;
        let request: CreateReportRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.credentials.access_key_id(), "AKIA");
        assert_eq!(request.credentials.region(), "eu-central-1");
        assert_eq!(request.credentials.session_token(), None, "empty token is absent");
    }

    #[test]
    fn test_request_missing_fields_fail_validation_not_parsing() {
        let request: CreateReportRequest = serde_json::from_str("{}").unwrap();
        assert!(request.credentials.validate().is_err());
    }
}
