use std::fmt::Display;
use std::future::Future;

use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetrySettings {
    /// `retries` extra attempts after the first, delays taken from the global retry block.
    pub fn from_config(retries: u32, config: Option<&RetryConfig>) -> Self {
        let base_delay_ms = config.and_then(|c| c.base_delay_ms).unwrap_or(0);
        let max_delay_ms = config
            .and_then(|c| c.max_delay_ms)
            .unwrap_or(base_delay_ms);
        Self {
            attempts: retries.saturating_add(1),
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Runs `operation` until it succeeds or every attempt is spent, returning
    /// the last error. The operation receives the 1-based attempt index.
    pub async fn run_with_retry<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay_ms;
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!(attempt, attempts, "attempt {attempt}/{attempts} failed: {e}");
                    if delay > 0 {
                        sleep(Duration::from_millis(delay)).await;
                    }
                    delay = delay.saturating_mul(2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts, "all {attempts} attempts failed: {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn settings(attempts: u32) -> RetrySettings {
        RetrySettings {
            attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = settings(5)
            .run_with_retry(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let result: Result<(), String> = settings(3)
            .run_with_retry(|attempt| async move { Err(format!("failed {attempt}")) })
            .await;
        assert_eq!(result, Err("failed 3".to_owned()));
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let _: Result<(), &str> = settings(0)
            .run_with_retry(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_up_to_the_cap() {
        let retry = RetrySettings {
            attempts: 4,
            base_delay_ms: 100,
            max_delay_ms: 250,
        };
        let started = tokio::time::Instant::now();
        let _: Result<(), &str> = retry.run_with_retry(|_| async { Err("down") }).await;
        // 100 + 200 + 250
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(550), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");
    }

    #[test]
    fn settings_from_config() {
        assert_eq!(
            RetrySettings::from_config(2, None),
            RetrySettings {
                attempts: 3,
                base_delay_ms: 0,
                max_delay_ms: 0
            }
        );
        let config = RetryConfig {
            base_delay_ms: Some(50),
            max_delay_ms: None,
        };
        assert_eq!(RetrySettings::from_config(0, Some(&config)).max_delay_ms, 50);
    }
}
