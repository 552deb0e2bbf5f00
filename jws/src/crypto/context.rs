use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::error::CapabilityError;

/// Cancellation and deadline for the operations that may suspend: signing,
/// verification and key resolution.
///
/// Cloning a context shares its cancellation token.
#[derive(Clone, Debug, Default)]
pub struct Context {
    cancellation: CancellationToken,
    timeout: Option<Duration>,
}

impl Context {
    /// A context that is never cancelled and has no timeout
    pub fn background() -> Self {
        Context::default()
    }

    /// Bound every capability call made under this context
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Tie this context to an externally owned token
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn cancel(&self) {
        self.cancellation.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Drive a capability future to completion unless this context is
    /// cancelled or its timeout elapses first. Either of those drops the
    /// future and surfaces as a distinct [`CapabilityError`].
    pub async fn run<F, T>(&self, operation: F) -> Result<T, CapabilityError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if self.is_cancelled() {
            return Err(CapabilityError::Cancelled);
        }

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => Err(CapabilityError::Cancelled),
                result = operation => result.map_err(CapabilityError::Failed),
            }
        };

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, guarded)
                .await
                .map_err(|_| CapabilityError::TimedOut(timeout))?,
            None => guarded.await,
        }
    }
}
