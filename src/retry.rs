//! Backoff around browser calls that fail transiently.
//!
//! Only navigation and browser-protocol errors are retried; anything else is
//! returned on the first failure. The round-level select/check/refresh loop
//! lives in [`crate::export::controller`].

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::types::ExportError;

/// Exponential backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (0-based), capped at `max_delay`
    pub fn delay_before(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
pub async fn retry<T, F, Fut>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T, ExportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExportError>>,
{
    let mut retries = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    debug!("{} succeeded after {} retries", what, retries);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_transient() || retries >= config.max_retries {
            return Err(err);
        }

        let delay = config.delay_before(retries);
        warn!(
            "{} failed (attempt {}/{}): {}. Retrying in {:?}",
            what,
            retries + 1,
            config.max_retries + 1,
            err,
            delay
        );
        sleep(delay).await;
        retries += 1;
    }
}
