//! Retry and backoff helpers shared by the monitoring client and catalog backends.

use std::time::Duration;

const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Request timeout and retry budget applied to every outbound HTTP call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub request_timeout_ms: u64,
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms.max(1)
    }
}

pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay
            .max(Duration::from_millis(base_delay_ms))
            .min(Duration::from_millis(MAX_RETRY_DELAY_MS));
    }
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled.min(MAX_RETRY_DELAY_MS))
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

/// Status and body of the last attempt made by [`send_with_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalReply {
    pub status: u16,
    pub body: String,
}

impl TerminalReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends the request built by `request_builder`, retrying throttling, server
/// errors and transient transport failures until `policy` runs out of attempts.
///
/// Any HTTP reply that is not retried is returned, successful or not; only a
/// transport failure on the last attempt is an error.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    operation: &str,
    mut request_builder: F,
) -> Result<TerminalReply, reqwest::Error>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let max_attempts = policy.attempts();
    let mut attempt = 0_usize;
    loop {
        attempt = attempt.saturating_add(1);
        match request_builder().send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let retry_after = parse_retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                if attempt < max_attempts && is_retryable_status(status) {
                    tracing::debug!(operation, status, attempt, "retrying http request");
                    tokio::time::sleep(retry_delay(policy.base_delay_ms(), attempt, retry_after))
                        .await;
                    continue;
                }
                return Ok(TerminalReply { status, body });
            }
            Err(error) => {
                if attempt < max_attempts && is_retryable_transport_error(&error) {
                    tracing::debug!(operation, attempt, error = %error, "retrying http transport failure");
                    tokio::time::sleep(retry_delay(policy.base_delay_ms(), attempt, None)).await;
                    continue;
                }
                return Err(error);
            }
        }
    }
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
