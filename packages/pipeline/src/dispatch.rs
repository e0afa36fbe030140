//! Fire-and-forget job dispatch.
//!
//! Jobs are published as JSON messages. Nothing waits for them to run and
//! nothing retries a failed send.

use sidewalk_measurement_models::JobRequest;
use tokio::sync::mpsc;

/// Errors that can occur while publishing a job.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The job could not be encoded.
    #[error("Failed to encode job: {0}")]
    Encode(#[from] serde_json::Error),

    /// The consumer side of the queue has gone away.
    #[error("Job queue is closed")]
    QueueClosed,
}

/// Publishes downstream job requests.
pub trait JobDispatcher: Send + Sync {
    /// Publishes `job` without waiting for it to run.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the job cannot be published.
    fn dispatch(&self, job: &JobRequest) -> Result<(), DispatchError>;
}

/// Publishes jobs as JSON onto an unbounded in-process queue.
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    sender: mpsc::UnboundedSender<String>,
}

impl QueueDispatcher {
    /// Wraps an existing queue sender.
    #[must_use]
    pub const fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }

    /// Creates a dispatcher and the receiving end of its queue.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl JobDispatcher for QueueDispatcher {
    fn dispatch(&self, job: &JobRequest) -> Result<(), DispatchError> {
        let body = serde_json::to_string(job)?;
        self.sender
            .send(body)
            .map_err(|_| DispatchError::QueueClosed)?;
        log::debug!(
            "Dispatched {} job for project {} {}",
            job.job_name,
            job.payload.project_id,
            job.payload.stage
        );
        Ok(())
    }
}

/// Drops every job. Used when downstream processing is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl JobDispatcher for NoopDispatcher {
    fn dispatch(&self, job: &JobRequest) -> Result<(), DispatchError> {
        log::info!(
            "Skipping {} job for project {} {} (dispatch disabled)",
            job.job_name,
            job.payload.project_id,
            job.payload.stage
        );
        Ok(())
    }
}
