//! Bounded, fixed-delay retry loop.
//!
//! Every attempt produces either an error or a [`Verdict`]. Errors and
//! [`Verdict::RetryRequested`] both trigger another attempt while the budget
//! lasts; they differ only in how exhaustion ends: an error is returned to the
//! caller, a retry-requested value is handed back as [`Resolution::Exhausted`].

use log::{debug, warn};
use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

/// Default number of attempts for a request: a single try.
pub const DEFAULT_ATTEMPTS: NonZeroU32 = NonZeroU32::MIN;

/// Default delay between attempts in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 500;

/// Classification of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<T> {
    /// The value is final, stop retrying.
    Accept(T),
    /// The value is usable but another attempt was requested.
    RetryRequested(T),
}

/// How the retry loop ended when it did not end with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Accepted { value: T, attempts: u32 },
    /// Every attempt asked for a retry; `value` is the one observed last.
    Exhausted { value: T, attempts: u32 },
}

impl<T> Resolution<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Resolution::Accepted { attempts, .. } | Resolution::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Resolution::Exhausted { .. })
    }

    pub fn into_value(self) -> T {
        match self {
            Resolution::Accepted { value, .. } | Resolution::Exhausted { value, .. } => value,
        }
    }
}

/// Runs `operation` until it returns [`Verdict::Accept`] or `attempts` is used up.
///
/// Attempts run strictly one after another with `delay` between them. No delay
/// follows the final attempt. When the last attempt fails, its error (not the
/// first one) is returned.
pub async fn retry_until_accepted<F, Fut, T, E>(
    operation_name: &str,
    attempts: NonZeroU32,
    delay: Duration,
    mut operation: F,
) -> Result<Resolution<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Verdict<T>, E>>,
    E: Display,
{
    let max_attempts = attempts.get();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(Verdict::Accept(value)) => {
                return Ok(Resolution::Accepted {
                    value,
                    attempts: attempt,
                });
            }
            Ok(Verdict::RetryRequested(value)) => {
                if attempt == max_attempts {
                    debug!(
                        "{}: retry still requested after {} attempts, giving up",
                        operation_name, attempt
                    );
                    return Ok(Resolution::Exhausted {
                        value,
                        attempts: attempt,
                    });
                }
                debug!(
                    "{}: attempt {}/{} asked for a retry, retrying in {}ms...",
                    operation_name,
                    attempt,
                    max_attempts,
                    delay.as_millis()
                );
            }
            Err(e) => {
                if attempt == max_attempts {
                    debug!("{}: failed after {} attempts: {}", operation_name, attempt, e);
                    return Err(e);
                }
                warn!(
                    "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                    operation_name,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
            }
        }

        attempt += 1;
        tokio::time::sleep(delay).await;
    }
}

/// Executes an async operation up to `attempts` times with a fixed `delay`.
/// Returns the first success, or the error of the last attempt.
pub async fn retry_execute<F, Fut, T, E>(
    operation_name: &str,
    attempts: NonZeroU32,
    delay: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let resolution = retry_until_accepted(operation_name, attempts, delay, || {
        let attempt = operation();
        async move { attempt.await.map(Verdict::Accept) }
    })
    .await?;

    Ok(resolution.into_value())
}
