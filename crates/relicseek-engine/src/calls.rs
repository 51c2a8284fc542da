//! Bounded, cancellable port calls
//!
//! Ports are synchronous, so each call runs on the blocking pool. The
//! caller stops waiting when the call exceeds its timeout, when the session
//! is cancelled, or when the session deadline passes.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a port call produced no value
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CallError<E> {
    /// The port returned an error
    Port(E),
    /// The call exceeded the per-call timeout
    TimedOut,
    /// The session was cancelled or its deadline passed
    Interrupted,
    /// The call panicked
    Crashed(String),
}

#[derive(Debug, Clone)]
pub(crate) struct PortCaller {
    timeout: Duration,
    cancel: CancellationToken,
    deadline: Instant,
}

impl PortCaller {
    pub(crate) fn new(timeout: Duration, cancel: CancellationToken, deadline: Instant) -> Self {
        Self {
            timeout,
            cancel,
            deadline,
        }
    }

    /// A caller bound only by the per-call timeout
    pub(crate) fn timeout_only(&self) -> Self {
        Self {
            timeout: self.timeout,
            cancel: CancellationToken::new(),
            deadline: Instant::now() + self.timeout + Duration::from_secs(1),
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.deadline
    }

    pub(crate) async fn run<T, E, F>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        if self.is_interrupted() {
            return Err(CallError::Interrupted);
        }

        let handle = tokio::task::spawn_blocking(f);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CallError::Interrupted),
            _ = tokio::time::sleep_until(self.deadline) => Err(CallError::Interrupted),
            result = tokio::time::timeout(self.timeout, handle) => match result {
                Err(_) => Err(CallError::TimedOut),
                Ok(Err(join_error)) => Err(CallError::Crashed(join_error.to_string())),
                Ok(Ok(Ok(value))) => Ok(value),
                Ok(Ok(Err(error))) => Err(CallError::Port(error)),
            },
        }
    }
}
