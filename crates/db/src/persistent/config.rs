//! Configuration of the retry store.

use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_READ_SIZE};

/// How retry records are aged and how much a single scan may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDbConfig {
    /// Attempts given to a freshly inserted record.
    ///
    /// 0 disables expiry: scans become read-only and records stay until explicitly deleted.
    max_attempts: u16,

    /// Upper bound on the cumulative key bytes returned by one scan.
    max_read_size: u64,
}

impl Default for RetryDbConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_read_size: DEFAULT_MAX_READ_SIZE,
        }
    }
}

impl RetryDbConfig {
    /// Sets the number of attempts given to new records.
    pub fn with_max_attempts(self, max_attempts: u16) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    /// Sets the maximum number of key bytes a scan may read.
    pub fn with_max_read_size(self, max_read_size: u64) -> Self {
        Self {
            max_read_size,
            ..self
        }
    }

    /// Returns the attempts given to new records.
    pub fn max_attempts(&self) -> u16 {
        self.max_attempts
    }

    /// Returns the maximum number of key bytes a scan may read.
    pub fn max_read_size(&self) -> u64 {
        self.max_read_size
    }
}
