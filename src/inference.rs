// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded worker pool for blocking inference
//!
//! Detection is CPU-bound and blocking, so it never runs on the async
//! executor. Jobs run on tokio's blocking threads, gated by a semaphore so
//! at most `max_concurrent` inferences are in flight. The permit travels
//! into the blocking closure and is released only when the work actually
//! finishes, even if the waiting request has already timed out.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference pool is shutting down")]
    ShuttingDown,

    #[error("inference job was cancelled before it started")]
    Cancelled,

    #[error("inference worker failed: {0}")]
    WorkerFailed(String),
}

/// Pool sizing and deadline
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_concurrent: usize,
    /// Covers queue wait plus execution
    pub timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferencePool {
    permits: Arc<Semaphore>,
    config: PoolConfig,
    shutdown: CancellationToken,
}

impl InferencePool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Permits not currently held by a running job
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.permits.close();
    }

    /// Run a blocking job under the pool's bound and deadline
    pub async fn run<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(PoolError::ShuttingDown);
        }

        let job_token = self.shutdown.child_token();
        let work = {
            let permits = self.permits.clone();
            let job_token = job_token.clone();
            async move {
                let permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| PoolError::ShuttingDown)?;
                debug!("Inference permit acquired");

                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    if job_token.is_cancelled() {
                        return Err(PoolError::Cancelled);
                    }
                    Ok(job())
                });

                handle
                    .await
                    .map_err(|e| PoolError::WorkerFailed(e.to_string()))?
            }
        };

        tokio::select! {
            result = tokio::time::timeout(self.config.timeout, work) => match result {
                Ok(inner) => inner,
                Err(_) => {
                    job_token.cancel();
                    warn!("Inference exceeded {:?}", self.config.timeout);
                    Err(PoolError::Timeout(self.config.timeout))
                }
            },
            _ = self.shutdown.cancelled() => Err(PoolError::ShuttingDown),
        }
    }
}
