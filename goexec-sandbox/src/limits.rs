//! Resource limits for sandboxed execution

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds applied to every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum wall-clock lifetime of a child before it is killed
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Maximum number of child processes running at once
    pub max_concurrent: usize,

    /// How long a request may wait for a free slot before being rejected
    #[serde(with = "humantime_serde")]
    pub queue_timeout: Duration,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(10)),
            max_concurrent: 8,
            queue_timeout: Duration::from_secs(5),
        }
    }
}

impl ResourceLimits {
    /// No deadline on children (dangerous for untrusted code!)
    pub fn unlimited() -> Self {
        Self {
            timeout: None,
            max_concurrent: usize::from(u16::MAX),
            queue_timeout: Duration::from_secs(60),
        }
    }

    /// Tight limits for shared hosts
    pub fn strict() -> Self {
        Self {
            timeout: Some(Duration::from_secs(5)),
            max_concurrent: 2,
            queue_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_queue_timeout(mut self, queue_timeout: Duration) -> Self {
        self.queue_timeout = queue_timeout;
        self
    }
}
