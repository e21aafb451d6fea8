// src/provider/retry.rs — Backoff wrapper for hosted model backends
//
// Only errors the backend marked retriable are retried (429, 5xx, timeouts,
// dropped connections). Credential and request errors surface immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{GenerateRequest, ModelProvider};
use crate::infra::errors::ChipLoopError;

/// Doubling backoff between attempts, capped, with server hints taking priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Retries after the first attempt.
    pub retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            retries: 4,
            base: Duration::from_secs(2),
            cap: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    /// Wait before retry number `retry` (0 = first retry).
    pub fn delay(&self, retry: u32, error: &ChipLoopError) -> Duration {
        if let ChipLoopError::RateLimited { retry_after_ms, .. } = error {
            if *retry_after_ms > 0 {
                return Duration::from_millis(*retry_after_ms).min(self.cap * 2);
            }
        }
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

pub struct RetryProvider {
    inner: Arc<dyn ModelProvider>,
    backoff: Backoff,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn ModelProvider>) -> Self {
        Self::with_backoff(inner, Backoff::default())
    }

    pub fn with_backoff(inner: Arc<dyn ModelProvider>, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }
}

#[async_trait]
impl ModelProvider for RetryProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Vec<String>, ChipLoopError> {
        let mut retry = 0;
        loop {
            let error = match self.inner.generate(request.clone()).await {
                Ok(texts) => return Ok(texts),
                Err(e) => e,
            };
            if !error.is_retriable() || retry >= self.backoff.retries {
                return Err(error);
            }

            let delay = self.backoff.delay(retry, &error);
            tracing::warn!(
                backend = self.inner.id(),
                retry = retry + 1,
                max_retries = self.backoff.retries,
                delay_ms = delay.as_millis() as u64,
                "{}",
                error
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
