//! Exponential backoff around transient upstream failures.

use std::future::Future;

use crate::traits::{ChatProvider, TurnRequest, TurnResponse};
use tc_domain::config::RetryConfig;
use tc_domain::error::Result;
use tc_domain::stream::{BoxStream, StreamChunk};
use tc_domain::trace::TraceEvent;

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. The last error is returned unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryConfig, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                TraceEvent::RetryScheduled {
                    attempt: attempt + 1,
                    delay_ms: delay.as_millis() as u64,
                    reason: e.to_string(),
                }
                .emit();
                tracing::warn!(op = label, attempt = attempt + 1, ?delay, error = %e, "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A [`ChatProvider`] that retries its inner provider.
///
/// Streams are only retried while opening; once chunks flow, errors pass
/// through to the consumer.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryConfig,
}

impl<P: ChatProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryConfig) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl<P: ChatProvider> ChatProvider for RetryingProvider<P> {
    async fn send_turn(&self, req: &TurnRequest) -> Result<TurnResponse> {
        with_retry(&self.policy, "send_turn", || self.inner.send_turn(req)).await
    }

    async fn stream_turn(&self, req: &TurnRequest) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        with_retry(&self.policy, "stream_turn", || self.inner.stream_turn(req)).await
    }

    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }
}
