//! A single deadline-bounded network attempt
//!
//! The request runs on its own task and reports back over a oneshot channel.
//! Giving up on an attempt closes the receiving side: the task is left to
//! finish its HTTP call, but its late outcome is dropped instead of delivered,
//! and delivering never blocks.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{ClientError, Result};

/// What became of one attempt
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// The overseer answered with a success status
    Success(T),
    /// Transport failure, error status or undecodable answer
    Failed(ClientError),
    /// Nothing arrived before the deadline; the attempt was abandoned
    TimedOut(Duration),
}

impl<T> AttemptOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failed(err) => Err(err),
            Self::TimedOut(deadline) => Err(ClientError::Timeout(deadline)),
        }
    }
}

/// An attempt that has been dispatched but not yet acted upon
pub struct PendingAttempt<T> {
    outcome_rx: oneshot::Receiver<Result<T>>,
}

impl<T: Send + 'static> PendingAttempt<T> {
    /// Run `request` on a separate task.
    pub fn dispatch<F>(request: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (outcome_tx, outcome_rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = request.await;
            if outcome_tx.is_closed() || outcome_tx.send(result).is_err() {
                debug!("Attempt finished after it was abandoned, discarding outcome");
            }
        });

        Self { outcome_rx }
    }

    /// Wait at most `deadline` for the outcome. Exactly one outcome is
    /// produced; on timeout the attempt is abandoned.
    pub async fn wait(mut self, deadline: Duration) -> AttemptOutcome<T> {
        match tokio::time::timeout(deadline, &mut self.outcome_rx).await {
            Ok(Ok(Ok(value))) => AttemptOutcome::Success(value),
            Ok(Ok(Err(err))) => AttemptOutcome::Failed(err),
            Ok(Err(_)) => AttemptOutcome::Failed(ClientError::TaskFailed(
                "attempt task ended without reporting an outcome".to_string(),
            )),
            Err(_) => {
                self.abandon();
                AttemptOutcome::TimedOut(deadline)
            }
        }
    }

    /// Stop listening for the outcome; a late result is silently dropped.
    pub fn abandon(mut self) {
        self.outcome_rx.close();
    }
}
