// Retry policy for mapping lookups (strategy pattern)

use crate::config::DistanceConfig;
use crate::port::MappingError;
use std::time::Duration;

/// Decides how many times the mapping service is tried before falling back
pub trait RetryStrategy: Send + Sync {
    /// Total attempts; `0` skips the network entirely
    fn max_attempts(&self) -> u32;

    /// Delay before attempt `attempt + 1` (attempts are 1-based)
    fn backoff(&self, attempt: u32) -> Duration;

    /// Quota errors will not clear up within a request, so stop early
    fn is_retryable(&self, err: &MappingError) -> bool {
        !matches!(err, MappingError::Quota(_))
    }
}

/// Fixed attempt count with a constant short delay
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    attempts: u32,
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn from_config(config: &DistanceConfig) -> Self {
        Self::new(config.max_attempts, config.retry_backoff())
    }
}

impl RetryStrategy for FixedBackoff {
    fn max_attempts(&self) -> u32 {
        self.attempts
    }

    fn backoff(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Never call the mapping service; always use the fallback estimate
#[derive(Debug, Clone, Copy)]
pub struct AlwaysFallback;

impl RetryStrategy for AlwaysFallback {
    fn max_attempts(&self) -> u32 {
        0
    }

    fn backoff(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}
