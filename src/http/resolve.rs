//! Status-code driven retries on top of the generic retry loop.
//!
//! A response whose status is in the retry set is not an error: it asks for
//! another attempt, and if none are left it is returned as the best answer
//! available. Only transport failures with no response at all end up as
//! errors.

use std::collections::BTreeSet;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use log::debug;
use reqwest::StatusCode;

use super::error::{RequestError, TransportError};
use super::response::ApiResponse;
use crate::retry::{DEFAULT_ATTEMPTS, DEFAULT_DELAY_MS, Verdict, retry_until_accepted};

/// How many times to try, how long to wait in between, and which status
/// codes should trigger another try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: NonZeroU32,
    pub delay: Duration,
    pub retry_status_codes: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            retry_status_codes: BTreeSet::new(),
        }
    }
}

impl RetryPolicy {
    /// Rejects `attempts == 0`; a policy always makes at least one attempt.
    pub fn new(
        attempts: u32,
        delay_ms: u64,
        retry_status_codes: impl IntoIterator<Item = u16>,
    ) -> Result<Self, RequestError> {
        let attempts = NonZeroU32::new(attempts)
            .ok_or_else(|| RequestError::invalid("attempts must be at least 1"))?;

        Ok(Self {
            attempts,
            delay: Duration::from_millis(delay_ms),
            retry_status_codes: retry_status_codes.into_iter().collect(),
        })
    }

    pub fn should_retry(&self, status: StatusCode) -> bool {
        self.retry_status_codes.contains(&status.as_u16())
    }

    pub fn classify(&self, response: ApiResponse) -> Verdict<ApiResponse> {
        if self.should_retry(response.status) {
            Verdict::RetryRequested(response)
        } else {
            Verdict::Accept(response)
        }
    }
}

/// Invokes `invoke` under `policy` and returns the final response.
///
/// - A transport error carrying a response is treated as that response.
/// - A response with a retryable status is retried; when attempts run out
///   the last one is returned, not an error.
/// - A transport error with no response is retried; when attempts run out
///   that error is returned.
pub async fn resolve<F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut invoke: F,
) -> Result<ApiResponse, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiResponse, TransportError>>,
{
    let resolution = retry_until_accepted(operation_name, policy.attempts, policy.delay, || {
        let attempt = invoke();
        async move {
            let response = match attempt.await {
                Ok(response) => response,
                Err(e) => e.try_into_response()?,
            };
            Ok::<_, TransportError>(policy.classify(response))
        }
    })
    .await?;

    if resolution.is_exhausted() {
        debug!(
            "{}: still got a retryable status after {} attempts, returning the last response",
            operation_name,
            resolution.attempts()
        );
    }

    Ok(resolution.into_value())
}
