//! Configuration Module
//!
//! Handles loading and validating store configuration, optionally from
//! environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default interval between sweeper passes in milliseconds
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;

/// Store configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Interval between background sweeps of expired entries
    pub sweep_interval: Duration,
}

impl StoreConfig {
    /// Creates a new StoreConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new StoreConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SWEEP_INTERVAL_MS` - Sweep interval in milliseconds (default: 1000)
    ///
    /// Unparseable values fall back to the default. A value of `0` is kept
    /// as-is and rejected when the store is constructed.
    pub fn from_env() -> Self {
        let millis = env::var("SWEEP_INTERVAL_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_MS);

        Self {
            sweep_interval: Duration::from_millis(millis),
        }
    }

    /// Sets the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Checks that the configuration can back a running store.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "sweep interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}
