//! Polling of asynchronous video analysis jobs.
//!
//! A queued video is polled on a fixed interval until the server reports a
//! terminal status, the time budget runs out, or the caller cancels.
//! Iterations are strictly sequential and nothing is retried: every failure
//! ends the poll and is reported as a single [`ClientError`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::Instrument;

use kyc_models::{JobId, JobState, JobStatus, JobStatusResponse};

use crate::body::{error_detail, HttpReply, ParsedBody};
use crate::client::ApiClient;
use crate::config::PollConfig;
use crate::error::{ClientError, ClientResult};
use crate::logging::JobLogger;
use crate::metrics::record_poll_tick;
use crate::session::SessionManager;

/// Where job status replies come from.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Fetch the raw status reply. Only transport or auth problems are errors.
    async fn fetch_status(&self, job_id: &JobId) -> ClientResult<HttpReply>;
}

/// Status endpoint of the video deepfake detector, authorized by the session.
pub struct VideoJobStatus {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
}

impl VideoJobStatus {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionManager>) -> Self {
        Self { api, session }
    }
}

#[async_trait]
impl JobStatusSource for VideoJobStatus {
    async fn fetch_status(&self, job_id: &JobId) -> ClientResult<HttpReply> {
        let token = self.session.bearer()?;
        self.api.job_status(&token, job_id.as_str()).await
    }
}

/// How a poll ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The job finished; carries the result payload
    Done(Value),
    /// The caller cancelled; all job state was dropped
    Cancelled,
}

/// Polls one job at a time until it reaches a terminal state.
pub struct JobPoller {
    source: Arc<dyn JobStatusSource>,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(source: Arc<dyn JobStatusSource>, config: PollConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Poll a job until it finishes, fails, times out, or `cancel` turns true.
    pub async fn poll(&self, job_id: &JobId, cancel: watch::Receiver<bool>) -> ClientResult<PollOutcome> {
        self.poll_with_progress(job_id, cancel, |_| {}).await
    }

    /// Like [`poll`](Self::poll), reporting every state change to `on_progress`.
    ///
    /// Cancellation is checked at the top of each iteration and again before
    /// a fetched reply is applied; the wait between iterations also wakes on
    /// a cancel signal.
    pub async fn poll_with_progress<F>(
        &self,
        job_id: &JobId,
        mut cancel: watch::Receiver<bool>,
        mut on_progress: F,
    ) -> ClientResult<PollOutcome>
    where
        F: FnMut(&JobState) + Send,
    {
        let logger = JobLogger::new(job_id, "video_deepfake");
        let span = logger.create_span();

        async move {
            let started = Instant::now();
            let mut state = JobState::new(job_id.clone());

            logger.log_start(&format!(
                "interval {}ms, timeout {}ms",
                self.config.interval.as_millis(),
                self.config.timeout.as_millis()
            ));
            on_progress(&state);

            loop {
                if *cancel.borrow() {
                    logger.log_completion("cancelled");
                    return Ok(PollOutcome::Cancelled);
                }

                let elapsed = started.elapsed();
                state.elapsed_secs = elapsed.as_secs();
                if elapsed >= self.config.timeout {
                    return time_out(job_id, &mut state, elapsed, &mut on_progress, &logger);
                }

                // A stalled request counts against the same budget and does
                // not hold off a cancel.
                let remaining = self.config.timeout - elapsed;
                let fetch = tokio::time::timeout(remaining, self.source.fetch_status(job_id));
                let fetched = tokio::select! {
                    fetched = fetch => fetched,
                    _ = cancelled(&mut cancel) => {
                        logger.log_completion("cancelled during status request");
                        return Ok(PollOutcome::Cancelled);
                    }
                };
                let fetched = match fetched {
                    Ok(fetched) => fetched,
                    Err(_) => {
                        return time_out(job_id, &mut state, started.elapsed(), &mut on_progress, &logger)
                    }
                };

                if *cancel.borrow() {
                    logger.log_completion("cancelled");
                    return Ok(PollOutcome::Cancelled);
                }
                state.elapsed_secs = started.elapsed().as_secs();

                let reply = match fetched {
                    Ok(reply) => reply,
                    Err(e) if e.is_auth() => {
                        return fail(&mut state, &mut on_progress, &logger, ClientError::SessionExpired)
                    }
                    Err(e) => return fail(&mut state, &mut on_progress, &logger, e),
                };

                if !reply.is_success() {
                    return fail(&mut state, &mut on_progress, &logger, status_error(&reply));
                }

                let body = match reply.parsed() {
                    ParsedBody::Json(value) if value.is_object() => value,
                    ParsedBody::Json(value) => {
                        let err = ClientError::JobFailed(value.to_string());
                        return fail(&mut state, &mut on_progress, &logger, err);
                    }
                    ParsedBody::Text(text) => {
                        return fail(&mut state, &mut on_progress, &logger, ClientError::JobFailed(text));
                    }
                    ParsedBody::Empty => {
                        let err = ClientError::JobFailed("empty status response".to_string());
                        return fail(&mut state, &mut on_progress, &logger, err);
                    }
                };

                let status = JobStatusResponse::from_value(&body).unwrap_or_default();

                match status.job_status() {
                    Some(JobStatus::Done) => {
                        let result = status.result_payload(&body);
                        state.complete(result.clone());
                        on_progress(&state);
                        record_poll_tick("done");
                        logger.log_completion(&format!("done after {}s", state.elapsed_secs));
                        return Ok(PollOutcome::Done(result));
                    }
                    Some(JobStatus::Failed) | Some(JobStatus::Timeout) => {
                        let err = ClientError::JobFailed(status.failure_message());
                        return fail(&mut state, &mut on_progress, &logger, err);
                    }
                    Some(reported) => {
                        state.advance(reported);
                        record_poll_tick(reported.as_str());
                        logger.log_status(reported, state.elapsed_secs);
                    }
                    None => {
                        record_poll_tick("unknown");
                        logger.log_warning(&format!(
                            "unknown status {:?}, still waiting",
                            status.status.as_deref().unwrap_or("<missing>")
                        ));
                    }
                }
                on_progress(&state);

                self.pause(&mut cancel).await;
            }
        }
        .instrument(span)
        .await
    }

    /// Sleep for one interval, returning early if cancellation is signalled.
    async fn pause(&self, cancel: &mut watch::Receiver<bool>) {
        let sleep = tokio::time::sleep(self.config.interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return,
                changed = cancel.changed() => {
                    if changed.is_err() {
                        // Sender gone: nobody can cancel any more.
                        (&mut sleep).await;
                        return;
                    }
                    if *cancel.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

fn status_error(reply: &HttpReply) -> ClientError {
    if reply.status == 401 {
        return ClientError::SessionExpired;
    }

    let detail = error_detail(&reply.parsed()).unwrap_or_else(|| "no details provided".to_string());
    ClientError::StatusCheckFailed {
        status: reply.status,
        detail,
    }
}

/// Resolves once `cancel` is true. Never resolves if the sender goes away
/// without cancelling.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Whole seconds, rounded up so a short budget never reads as zero.
fn elapsed_secs_ceil(elapsed: Duration) -> u64 {
    elapsed.as_secs() + u64::from(elapsed.subsec_nanos() > 0)
}

fn time_out<F>(
    job_id: &JobId,
    state: &mut JobState,
    elapsed: Duration,
    on_progress: &mut F,
    logger: &JobLogger,
) -> ClientResult<PollOutcome>
where
    F: FnMut(&JobState),
{
    state.elapsed_secs = elapsed_secs_ceil(elapsed);
    let err = ClientError::JobTimeout {
        job_id: job_id.to_string(),
        elapsed_secs: state.elapsed_secs,
    };
    state.time_out(err.to_string());
    on_progress(state);
    record_poll_tick("timeout");
    logger.log_error(&err.to_string());
    Err(err)
}

fn fail<F>(
    state: &mut JobState,
    on_progress: &mut F,
    logger: &JobLogger,
    err: ClientError,
) -> ClientResult<PollOutcome>
where
    F: FnMut(&JobState),
{
    let message = err.to_string();
    state.fail(message.as_str());
    on_progress(state);
    record_poll_tick("failed");
    logger.log_error(&message);
    Err(err)
}
