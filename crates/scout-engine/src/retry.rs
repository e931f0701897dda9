//! Per-call retry loop for retryable connector errors.

use std::future::Future;

use scout_types::error::ConnectorError;

use crate::errors::compute_backoff;

/// Run `call`, retrying retryable failures up to `max_retries` extra times.
pub(crate) async fn with_retry<T, F, Fut>(
    operation: &str,
    max_retries: u32,
    mut call: F,
) -> Result<T, ConnectorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConnectorError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.retryable && attempt <= max_retries => {
                let delay = compute_backoff(&err, attempt);
                #[allow(clippy::cast_possible_truncation)]
                let delay_ms = delay.as_millis() as u64;
                tracing::warn!(
                    operation,
                    attempt,
                    max_retries,
                    delay_ms,
                    category = %err.category,
                    code = %err.code,
                    "Retryable error, will retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.retryable {
                    tracing::error!(
                        operation,
                        attempt,
                        max_retries,
                        category = %err.category,
                        code = %err.code,
                        "Max retries exhausted"
                    );
                } else {
                    tracing::debug!(
                        operation,
                        category = %err.category,
                        code = %err.code,
                        "Non-retryable error"
                    );
                }
                return Err(err);
            }
        }
    }
}
