//! Ordered fallback over interchangeable strategies.
//!
//! Binds, roster searches and password writes each have several ways to
//! reach the directory. Each way is a [`Strategy`]; a [`FallbackChain`] tries
//! them in order under a per-attempt timeout and stops at the first success.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{DirectoryError, DirectoryResult};

/// One way of performing an operation.
#[async_trait]
pub trait Strategy<C, T>: Send + Sync
where
    C: Sync,
{
    /// Short name for logs and error reports.
    fn label(&self) -> String;

    async fn attempt(&self, ctx: &C) -> DirectoryResult<T>;
}

/// When a failed attempt moves on to the next strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallThrough {
    /// Only transient failures fall through; terminal ones stop the chain.
    TransientOnly,
    /// Every failure falls through.
    Always,
}

/// Runs strategies in order until one succeeds.
pub struct FallbackChain<C, T> {
    name: &'static str,
    strategies: Vec<Arc<dyn Strategy<C, T>>>,
    timeout: Duration,
    fall_through: FallThrough,
}

impl<C, T> FallbackChain<C, T>
where
    C: Sync,
{
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        Self {
            name,
            strategies: Vec::new(),
            timeout,
            fall_through: FallThrough::TransientOnly,
        }
    }

    /// Append a strategy.
    #[must_use]
    pub fn with(mut self, strategy: Arc<dyn Strategy<C, T>>) -> Self {
        self.strategies.push(strategy);
        self
    }

    #[must_use]
    pub fn falling_through(mut self, fall_through: FallThrough) -> Self {
        self.fall_through = fall_through;
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.label()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order.
    ///
    /// A timed-out attempt is abandoned and counts as transient. Returns the
    /// first success, the first terminal error, or
    /// [`DirectoryError::StrategiesExhausted`] naming every failed attempt.
    pub async fn run(&self, ctx: &C) -> DirectoryResult<T> {
        let mut failures = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let label = strategy.label();
            let started = Instant::now();
            let outcome = tokio::time::timeout(self.timeout, strategy.attempt(ctx)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let error = match outcome {
                Ok(Ok(value)) => {
                    info!(
                        chain = self.name,
                        strategy = %label,
                        elapsed_ms,
                        outcome = "success",
                        "Directory strategy succeeded"
                    );
                    return Ok(value);
                }
                Ok(Err(error)) => error,
                Err(_) => DirectoryError::Timeout {
                    operation: format!("{} via {label}", self.name),
                    timeout_ms: self.timeout.as_millis() as u64,
                },
            };

            let falls_through =
                self.fall_through == FallThrough::Always || error.is_transient();
            if !falls_through {
                info!(
                    chain = self.name,
                    strategy = %label,
                    elapsed_ms,
                    outcome = "rejected",
                    error_code = error.error_code(),
                    "Directory strategy stopped the chain"
                );
                return Err(error);
            }

            warn!(
                chain = self.name,
                strategy = %label,
                elapsed_ms,
                outcome = "failed",
                error = %error,
                "Directory strategy failed, trying next"
            );
            failures.push(format!("{label}: {error}"));
        }

        Err(DirectoryError::StrategiesExhausted {
            chain: self.name,
            attempts: failures,
        })
    }
}
