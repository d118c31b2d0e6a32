//! Verification dashboard workflow.
//!
//! Ties the session, the API client and the job poller together:
//! submit a file, follow a queued video job to completion, keep the last
//! result for feedback, and clear everything on demand.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use kyc_models::{
    AnalysisKind, DetectionReport, FeedbackChoice, FeedbackRequest, JobState, Verdict,
    VideoSubmission,
};

use crate::client::{ApiClient, Upload};
use crate::config::PollConfig;
use crate::error::{ClientError, ClientResult};
use crate::poller::{cancelled, JobPoller, PollOutcome, VideoJobStatus};
use crate::session::SessionManager;

/// Message returned after feedback is accepted.
pub const FEEDBACK_THANKS: &str = "Thank you! Your feedback helps improve our AI.";

/// A finished verification.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub kind: AnalysisKind,
    pub report: DetectionReport,
}

impl AnalysisResult {
    pub fn verdict(&self) -> Verdict {
        self.report.verdict(self.kind)
    }
}

/// How an analysis request ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(AnalysisResult),
    /// Cleared by the user before the analysis finished
    Cancelled,
}

struct RetainedResult {
    result: AnalysisResult,
    feedback_sent: bool,
}

struct ActiveAnalysis {
    id: u64,
    cancel: watch::Sender<bool>,
}

/// Dashboard state and actions.
pub struct Dashboard {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    poller: JobPoller,
    active: Mutex<Option<ActiveAnalysis>>,
    next_analysis_id: AtomicU64,
    last_result: Mutex<Option<RetainedResult>>,
    progress: watch::Sender<Option<JobState>>,
}

impl Dashboard {
    /// Dashboard polling the video status endpoint with the session's token.
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionManager>, poll: PollConfig) -> Self {
        let source = Arc::new(VideoJobStatus::new(Arc::clone(&api), Arc::clone(&session)));
        Self::with_poller(api, session, JobPoller::new(source, poll))
    }

    pub fn with_poller(api: Arc<ApiClient>, session: Arc<SessionManager>, poller: JobPoller) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            api,
            session,
            poller,
            active: Mutex::new(None),
            next_analysis_id: AtomicU64::new(0),
            last_result: Mutex::new(None),
            progress,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Watch the state of the job being polled; `None` when there is none.
    pub fn job_progress(&self) -> watch::Receiver<Option<JobState>> {
        self.progress.subscribe()
    }

    /// The last completed analysis, if it has not been cleared.
    pub async fn last_result(&self) -> Option<AnalysisResult> {
        self.last_result
            .lock()
            .await
            .as_ref()
            .map(|retained| retained.result.clone())
    }

    // =========================================================================
    // Analyses
    // =========================================================================

    /// Check a video for deepfakes, following the job if the server queues it.
    pub async fn analyze_video(&self, video: Upload) -> ClientResult<AnalysisOutcome> {
        require_file(&video, "Please select a video")?;
        let token = self.session.bearer()?;

        let (id, mut cancel) = self.start_analysis().await;
        let report = self.run_video(&token, video, &mut cancel).await;
        self.end_analysis(id).await;

        self.settle(AnalysisKind::Video, &cancel, report).await
    }

    async fn run_video(
        &self,
        token: &str,
        video: Upload,
        cancel: &mut watch::Receiver<bool>,
    ) -> ClientResult<Option<DetectionReport>> {
        let submission = match until_cancelled(cancel, self.api.verify_video(token, video)).await {
            Some(submission) => submission?,
            None => return Ok(None),
        };

        let job_id = match submission {
            VideoSubmission::Completed(report) => return Ok(Some(report)),
            VideoSubmission::Queued(job_id) => job_id,
        };
        info!(job_id = %job_id, "Video queued for asynchronous analysis");

        let outcome = self
            .poller
            .poll_with_progress(&job_id, cancel.clone(), |state| {
                self.progress.send_replace(Some(state.clone()));
            })
            .await?;

        match outcome {
            PollOutcome::Done(payload) => Ok(Some(DetectionReport::from_value(payload)?)),
            PollOutcome::Cancelled => {
                info!(job_id = %job_id, "Video analysis cancelled");
                Ok(None)
            }
        }
    }

    /// Check an identity document for fraud.
    pub async fn analyze_document(&self, document: Upload) -> ClientResult<AnalysisOutcome> {
        require_file(&document, "Please select a document")?;
        let token = self.session.bearer()?;

        let (id, mut cancel) = self.start_analysis().await;
        let report = until_cancelled(&mut cancel, self.api.verify_document(&token, document))
            .await
            .transpose();
        self.end_analysis(id).await;

        self.settle(AnalysisKind::Document, &cancel, report).await
    }

    /// Match a selfie against an ID photo.
    pub async fn analyze_face(&self, selfie: Upload, id_photo: Upload) -> ClientResult<AnalysisOutcome> {
        if selfie.bytes.is_empty() || id_photo.bytes.is_empty() {
            return Err(ClientError::validation("Please select both selfie and ID"));
        }
        let token = self.session.bearer()?;

        let (id, mut cancel) = self.start_analysis().await;
        let report = until_cancelled(&mut cancel, self.api.verify_face(&token, selfie, id_photo))
            .await
            .transpose();
        self.end_analysis(id).await;

        self.settle(AnalysisKind::Face, &cancel, report).await
    }

    /// Cancel a running analysis (upload or video job) and forget the last
    /// result.
    pub async fn clear(&self) {
        if let Some(active) = self.active.lock().await.take() {
            active.cancel.send_replace(true);
        }
        self.last_result.lock().await.take();
        self.progress.send_replace(None);
    }

    // =========================================================================
    // Feedback
    // =========================================================================

    /// Rate the last result.
    pub async fn submit_feedback(
        &self,
        choice: FeedbackChoice,
        actual_label: Option<String>,
    ) -> ClientResult<String> {
        let token = self.session.bearer()?;

        let usage_log_id = {
            let retained = self.last_result.lock().await;
            let retained = retained
                .as_ref()
                .ok_or_else(|| ClientError::validation("There is no result to give feedback on"))?;
            if retained.feedback_sent {
                return Err(ClientError::validation("Feedback was already submitted for this result"));
            }
            retained
                .result
                .report
                .usage_log_id
                .clone()
                .ok_or_else(|| ClientError::validation("This result does not accept feedback"))?
        };

        let request = FeedbackRequest {
            usage_log_id,
            user_feedback: choice,
            user_actual_label: actual_label.filter(|label| !label.trim().is_empty()),
        };
        self.guard_auth(self.api.submit_feedback(&token, &request).await)?;

        if let Some(retained) = self.last_result.lock().await.as_mut() {
            if retained.result.report.usage_log_id.as_ref() == Some(&request.usage_log_id) {
                retained.feedback_sent = true;
            }
        }

        info!(usage_log_id = %request.usage_log_id, feedback = %choice, "Feedback submitted");
        Ok(FEEDBACK_THANKS.to_string())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Register a new analysis, cancelling any previous one.
    async fn start_analysis(&self) -> (u64, watch::Receiver<bool>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let id = self.next_analysis_id.fetch_add(1, Ordering::SeqCst);

        let previous = self.active.lock().await.replace(ActiveAnalysis {
            id,
            cancel: cancel_tx,
        });
        if let Some(previous) = previous {
            previous.cancel.send_replace(true);
        }
        self.last_result.lock().await.take();

        (id, cancel_rx)
    }

    async fn end_analysis(&self, id: u64) {
        {
            let mut active = self.active.lock().await;
            if active.as_ref().map(|a| a.id) == Some(id) {
                *active = None;
            }
        }
        self.progress.send_replace(None);
    }

    /// Turn the raw outcome into the caller's result. A cancelled analysis
    /// never stores a result, even if the server answered.
    async fn settle(
        &self,
        kind: AnalysisKind,
        cancel: &watch::Receiver<bool>,
        report: ClientResult<Option<DetectionReport>>,
    ) -> ClientResult<AnalysisOutcome> {
        if *cancel.borrow() {
            return Ok(AnalysisOutcome::Cancelled);
        }

        match self.guard_auth(report)? {
            Some(report) => Ok(self.finish(kind, report).await),
            None => Ok(AnalysisOutcome::Cancelled),
        }
    }

    async fn finish(&self, kind: AnalysisKind, report: DetectionReport) -> AnalysisOutcome {
        let result = AnalysisResult { kind, report };
        let verdict = result.verdict();
        info!(kind = %kind, verdict = %verdict.label, "Analysis completed");

        *self.last_result.lock().await = Some(RetainedResult {
            result: result.clone(),
            feedback_sent: false,
        });
        AnalysisOutcome::Completed(result)
    }

    /// An expired session on a protected call logs the user out.
    fn guard_auth<T>(&self, result: ClientResult<T>) -> ClientResult<T> {
        if let Err(ClientError::SessionExpired) = &result {
            warn!("Session expired during a protected call, logging out");
            self.session.logout();
        }
        result
    }
}

/// Run `work` unless `cancel` turns true first; dropping `work` aborts the
/// request.
async fn until_cancelled<F, T>(cancel: &mut watch::Receiver<bool>, work: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        output = work => Some(output),
        _ = cancelled(cancel) => None,
    }
}

fn require_file(upload: &Upload, message: &str) -> ClientResult<()> {
    if upload.bytes.is_empty() {
        return Err(ClientError::validation(message));
    }
    Ok(())
}
