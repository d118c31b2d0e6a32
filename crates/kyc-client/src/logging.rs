//! Structured logging for polled jobs.

use tracing::{error, info, warn, Span};

use kyc_models::{JobId, JobStatus};

/// Logs job lifecycle events with the job id and operation attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Polling started: {}", message
        );
    }

    /// Log a status reported by the server.
    pub fn log_status(&self, status: JobStatus, elapsed_secs: u64) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            status = %status,
            elapsed_secs,
            "Job status"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Polling warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Polling error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Polling finished: {}", message
        );
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job_poll",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
