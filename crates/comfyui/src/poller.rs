//! Fixed-interval completion polling.
//!
//! [`await_completion`] asks the history endpoint for the prompt, sleeps a
//! fixed interval, and repeats until the prompt shows up or the deadline
//! passes. There is no backoff, no jitter and no cancellation.

use std::time::Duration;

use tokio::time::Instant;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::history::JobResult;

/// Delay between history queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default time allowed for a prompt to finish.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Anything that can answer "is this prompt finished yet?".
pub trait HistorySource: Send + Sync {
    /// `Ok(None)` while the prompt is still queued or running.
    fn job_result(
        &self,
        prompt_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<JobResult>, ComfyUIApiError>> + Send;
}

impl HistorySource for ComfyUIApi {
    async fn job_result(&self, prompt_id: &str) -> Result<Option<JobResult>, ComfyUIApiError> {
        self.get_history(prompt_id).await
    }
}

/// Deadline and interval for [`await_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Poll `source` until `prompt_id` completes or `config.timeout` elapses.
///
/// The deadline is checked before every query, so a query is never issued
/// after the deadline has passed. Errors from the source end the wait
/// immediately.
pub async fn await_completion<S: HistorySource>(
    source: &S,
    prompt_id: &str,
    config: &PollConfig,
) -> Result<JobResult, ComfyUIApiError> {
    let start = Instant::now();
    let mut polls = 0u32;

    while start.elapsed() < config.timeout {
        polls += 1;
        if let Some(result) = source.job_result(prompt_id).await? {
            tracing::info!(
                prompt_id,
                polls,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Prompt completed",
            );
            return Ok(result);
        }
        tracing::debug!(prompt_id, polls, "Prompt not finished yet");
        tokio::time::sleep(config.interval).await;
    }

    tracing::warn!(
        prompt_id,
        polls,
        timeout_secs = config.timeout.as_secs(),
        "Gave up waiting for prompt",
    );
    Err(ComfyUIApiError::Timeout {
        prompt_id: prompt_id.to_string(),
        timeout: config.timeout,
    })
}
