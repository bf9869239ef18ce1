//! Report pipeline configuration.

use std::num::NonZeroUsize;

use secretaudit_storage::ConfigError;
use serde::{Deserialize, Serialize};

/// Default number of report jobs that may wait in the queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

const DEFAULT_QUEUE_CAPACITY_NONZERO: NonZeroUsize =
    NonZeroUsize::MIN.saturating_add(DEFAULT_QUEUE_CAPACITY - 1);

fn default_queue_capacity() -> NonZeroUsize {
    DEFAULT_QUEUE_CAPACITY_NONZERO
}

/// Configuration for [`ReportService`](crate::ReportService).
///
/// # Example
///
/// ```
/// use secretaudit_report::PipelineConfig;
///
/// let config = PipelineConfig::builder().queue_capacity(64).build()?;
/// assert_eq!(config.queue_capacity().get(), 64);
///
/// assert!(PipelineConfig::builder().queue_capacity(0).build().is_err());
/// # Ok::<(), secretaudit_storage::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Maximum number of admitted jobs waiting for the worker.
    #[serde(default = "default_queue_capacity")]
    pub(crate) queue_capacity: NonZeroUsize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { queue_capacity: default_queue_capacity() }
    }
}

#[bon::bon]
impl PipelineConfig {
    /// Creates a new pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `queue_capacity` is zero.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_QUEUE_CAPACITY)] queue_capacity: usize,
    ) -> Result<Self, ConfigError> {
        let Some(queue_capacity) = NonZeroUsize::new(queue_capacity) else {
            return Err(ConfigError::BelowMinimum {
                field: "queue_capacity",
                min: "1".into(),
                value: "0".into(),
            });
        };
        Ok(Self { queue_capacity })
    }

    /// Returns the job queue capacity.
    #[must_use]
    pub fn queue_capacity(&self) -> NonZeroUsize {
        self.queue_capacity
    }
}
