//! Bounded poll-with-sleep helpers.

use std::{future::Future, time::Duration};

#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub description: String,
    pub max_attempts: u32,
    pub interval: Duration,
}

impl WaitConfig {
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timeout waiting for {description} after {attempts} attempts")]
    Timeout { description: String, attempts: u32 },

    #[error(transparent)]
    Check(#[from] anyhow::Error),
}

/// Poll `check` until it returns true.
pub async fn wait_for<F, Fut>(config: WaitConfig, mut check: F) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    wait_for_result(config, || {
        let fut = check();
        async move { Ok(fut.await.then_some(())) }
    })
    .await
}

/// Poll `probe` until it yields `Some`. A probe error aborts the wait at once.
pub async fn wait_for_result<T, F, Fut>(config: WaitConfig, mut probe: F) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    for attempt in 1..=config.max_attempts {
        if let Some(value) = probe().await? {
            tracing::debug!("{} ready after {} attempt(s)", config.description, attempt);
            return Ok(value);
        }
        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval).await;
        }
    }

    Err(WaitError::Timeout {
        description: config.description,
        attempts: config.max_attempts,
    })
}
