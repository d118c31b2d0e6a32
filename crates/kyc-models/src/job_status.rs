//! Asynchronous video job status.
//!
//! A video submission that cannot be analyzed inline returns a job id. The
//! client then polls the status endpoint and tracks progress in a
//! [`JobState`] until the job reaches a terminal state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback message when the server reports a failure without details.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Video analysis failed";

/// Opaque identifier of a server-side job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued waiting for a worker
    Queued,
    /// Job is actively being processed
    #[default]
    Processing,
    /// Job completed successfully
    #[serde(alias = "completed")]
    Done,
    /// Job failed with an error
    Failed,
    /// Polling gave up before the job finished
    Timeout,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
        }
    }

    /// Parse a status string as reported by the server.
    ///
    /// Returns `None` for statuses this client does not know.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => Some(JobStatus::Queued),
            "processing" | "running" => Some(JobStatus::Processing),
            "done" | "completed" => Some(JobStatus::Done),
            "failed" | "error" => Some(JobStatus::Failed),
            "timeout" => Some(JobStatus::Timeout),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Timeout)
    }

    /// Position in the forward-only progression.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Done | JobStatus::Failed | JobStatus::Timeout => 2,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client-side record of a job being polled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    /// Job identifier returned by the submission call
    pub job_id: JobId,
    /// Current status
    pub status: JobStatus,
    /// Seconds since polling started
    pub elapsed_secs: u64,
    /// Result payload, only set on `done`
    pub result: Option<Value>,
    /// Error message on `failed` or `timeout`
    pub error: Option<String>,
    /// When polling started
    pub started_at: DateTime<Utc>,
}

impl JobState {
    /// Create a new state for a freshly submitted job.
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            elapsed_secs: 0,
            result: None,
            error: None,
            started_at: Utc::now(),
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a new status if it is a forward transition.
    ///
    /// Returns `true` if the status changed.
    pub fn advance(&mut self, status: JobStatus) -> bool {
        if self.is_terminal() || status == self.status || status.rank() < self.status.rank() {
            return false;
        }
        self.status = status;
        true
    }

    /// Mark job as done with its result payload.
    pub fn complete(&mut self, result: Value) {
        if self.advance(JobStatus::Done) {
            self.result = Some(result);
        }
    }

    /// Mark job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.advance(JobStatus::Failed) {
            self.error = Some(error.into());
        }
    }

    /// Mark job as timed out.
    pub fn time_out(&mut self, error: impl Into<String>) {
        if self.advance(JobStatus::Timeout) {
            self.error = Some(error.into());
        }
    }
}

/// Body of `GET /api/v1/video-deepfake/status/{jobId}`.
///
/// Read field by field from a JSON value so that unexpected types in one
/// field never reject the whole body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobStatusResponse {
    pub status: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub detail: Option<String>,
}

impl JobStatusResponse {
    /// Read a status body. Returns `None` if the body is not a JSON object.
    pub fn from_value(body: &Value) -> Option<Self> {
        let obj = body.as_object()?;
        Some(Self {
            status: obj.get("status").and_then(Value::as_str).map(str::to_string),
            result: obj.get("result").filter(|v| !v.is_null()).cloned(),
            error: obj.get("error").and_then(text_of),
            detail: obj.get("detail").and_then(text_of),
        })
    }

    /// Parsed status, if the server sent a known one.
    pub fn job_status(&self) -> Option<JobStatus> {
        self.status.as_deref().and_then(JobStatus::from_wire)
    }

    /// Result payload of a finished job.
    ///
    /// Older servers put the result fields at the top level, so the whole
    /// body is used when there is no nested `result`.
    pub fn result_payload(&self, body: &Value) -> Value {
        self.result.clone().unwrap_or_else(|| body.clone())
    }

    /// Failure message of a failed job.
    pub fn failure_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| {
                self.result
                    .as_ref()
                    .and_then(|r| r.get("error"))
                    .and_then(text_of)
            })
            .or_else(|| self.detail.clone())
            .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string())
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_status_wire_names() {
        assert_eq!(JobStatus::from_wire("queued"), Some(JobStatus::Queued));
        assert_eq!(JobStatus::from_wire("PROCESSING"), Some(JobStatus::Processing));
        assert_eq!(JobStatus::from_wire("done"), Some(JobStatus::Done));
        assert_eq!(JobStatus::from_wire("completed"), Some(JobStatus::Done));
        assert_eq!(JobStatus::from_wire("failed"), Some(JobStatus::Failed));
        assert_eq!(JobStatus::from_wire("warming_up"), None);

        let parsed: JobStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, JobStatus::Done);
        assert_eq!(JobStatus::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Timeout.is_terminal());
    }

    #[test]
    fn test_job_state_transitions() {
        let mut state = JobState::new(JobId::from_string("job-1"));
        assert_eq!(state.status, JobStatus::Processing);
        assert_eq!(state.elapsed_secs, 0);

        // Never moves backward
        assert!(!state.advance(JobStatus::Queued));
        assert_eq!(state.status, JobStatus::Processing);

        state.complete(json!({"confidence": 0.5}));
        assert_eq!(state.status, JobStatus::Done);
        assert!(state.result.is_some());

        // Terminal is final
        state.fail("late failure");
        assert_eq!(state.status, JobStatus::Done);
        assert!(state.error.is_none());
        state.time_out("late timeout");
        assert_eq!(state.status, JobStatus::Done);
    }

    #[test]
    fn test_status_response_nested_result() {
        let body = json!({"status": "done", "result": {"confidence": 0.87}});
        let resp = JobStatusResponse::from_value(&body).unwrap();
        assert_eq!(resp.job_status(), Some(JobStatus::Done));
        assert_eq!(resp.result_payload(&body), json!({"confidence": 0.87}));
    }

    #[test]
    fn test_status_response_flat_result() {
        let body = json!({"status": "done", "confidence": 0.4, "verdict": "REAL"});
        let resp = JobStatusResponse::from_value(&body).unwrap();
        assert_eq!(resp.result_payload(&body), body);
    }

    #[test]
    fn test_failure_message_sources() {
        let top = json!({"status": "failed", "error": "decoder crashed"});
        let resp = JobStatusResponse::from_value(&top).unwrap();
        assert_eq!(resp.failure_message(), "decoder crashed");

        let nested = json!({"status": "failed", "result": {"error": "no face found"}});
        let resp = JobStatusResponse::from_value(&nested).unwrap();
        assert_eq!(resp.failure_message(), "no face found");

        let bare = json!({"status": "failed"});
        let resp = JobStatusResponse::from_value(&bare).unwrap();
        assert_eq!(resp.failure_message(), DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn test_status_response_rejects_non_object() {
        assert!(JobStatusResponse::from_value(&json!("done")).is_none());
        assert!(JobStatusResponse::from_value(&json!([1, 2])).is_none());
    }
}
