//! KYC Shield API HTTP client.
//!
//! One pooled reqwest client with a cookie store. The refresh cookie set by
//! the auth endpoints lives in that store and is attached automatically; it
//! is never read by this crate.

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use kyc_models::{
    AccessTokenResponse, ContactResponse, ContactSubmission, DetectionReport, FeedbackRequest,
    FeedbackResponse, LoginRequest, VideoSubmission,
};

use crate::body::{error_detail, HttpReply, ParsedBody};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::metrics::record_request;

/// API routes, relative to the base URL.
pub mod routes {
    pub const AUTH_REFRESH: &str = "/api/v1/auth/refresh";
    pub const AUTH_LOGIN: &str = "/api/v1/auth/login";
    pub const VIDEO_VERIFY: &str = "/api/v1/video-deepfake/verify";
    pub const VIDEO_STATUS: &str = "/api/v1/video-deepfake/status";
    pub const DOCUMENT_VERIFY: &str = "/api/v1/document/verify";
    pub const FACE_VERIFY: &str = "/api/v1/face/verify";
    pub const BETA_FEEDBACK: &str = "/api/v1/beta/feedback";
    pub const CONTACT_SUBMIT: &str = "/api/v1/contact/submit";
}

const FEEDBACK_FAILED: &str = "Feedback submission failed";
const CONTACT_FAILED: &str = "Something went wrong. Please try again.";

// =============================================================================
// Uploads
// =============================================================================

/// A file to send in a multipart verification request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;

        if bytes.is_empty() {
            return Err(ClientError::validation(format!(
                "{} is empty",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            content_type: guess_content_type(path).to_string(),
            file_name,
            bytes,
        })
    }

    fn into_part(self) -> ClientResult<Part> {
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.content_type)
            .map_err(|e| ClientError::validation(format!("Invalid content type: {}", e)))
    }
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// Client
// =============================================================================

/// KYC Shield API client.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .cookie_store(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("kyc-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Send a request and read the whole response.
    ///
    /// Only transport failures are errors here; status handling is left to
    /// the caller.
    async fn send(&self, operation: &'static str, request: RequestBuilder) -> ClientResult<HttpReply> {
        let span = info_span!("kyc_request", operation = %operation);

        async {
            let start = Instant::now();
            let result = match request.send().await {
                Ok(response) => HttpReply::read(response).await,
                Err(e) => Err(e),
            };
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(reply) => {
                    record_request(operation, reply.status, latency_ms);
                    debug!(status = reply.status, latency_ms, "Request finished");
                    Ok(reply)
                }
                Err(e) => {
                    record_request(operation, 0, latency_ms);
                    warn!("Request failed: {}", e);
                    Err(ClientError::from(e))
                }
            }
        }
        .instrument(span)
        .await
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Exchange the refresh cookie for a new access token.
    pub async fn refresh_token(&self) -> ClientResult<AccessTokenResponse> {
        let request = self
            .http
            .post(self.url(routes::AUTH_REFRESH))
            .header(CONTENT_TYPE, "application/json");

        let reply = self.send("auth_refresh", request).await?;

        match reply.status {
            401 => Err(ClientError::unauthorized(
                error_detail(&reply.parsed()).unwrap_or_else(|| "refresh rejected".to_string()),
            )),
            _ if !reply.is_success() => Err(server_error(&reply)),
            _ => token_response(&reply),
        }
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AccessTokenResponse> {
        let body = LoginRequest::new(email, password);
        body.validate().map_err(ClientError::Validation)?;

        let request = self.http.post(self.url(routes::AUTH_LOGIN)).json(&body);
        let reply = self.send("auth_login", request).await?;

        if !reply.is_success() {
            return Err(ClientError::unauthorized("Invalid credentials"));
        }

        token_response(&reply)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Submit a video for deepfake analysis.
    pub async fn verify_video(&self, token: &str, video: Upload) -> ClientResult<VideoSubmission> {
        let form = Form::new().part("video", video.into_part()?);
        let request = self
            .http
            .post(self.url(routes::VIDEO_VERIFY))
            .bearer_auth(token)
            .multipart(form);

        let reply = self.send("video_verify", request).await?;
        let body = protected_json(&reply)?;
        Ok(VideoSubmission::from_body(body)?)
    }

    /// Fetch the raw status of a queued video job.
    pub async fn job_status(&self, token: &str, job_id: &str) -> ClientResult<HttpReply> {
        let url = format!(
            "{}/{}",
            self.url(routes::VIDEO_STATUS),
            urlencoding::encode(job_id)
        );
        let request = self.http.get(url).bearer_auth(token);
        self.send("video_status", request).await
    }

    /// Submit an identity document for fraud analysis.
    pub async fn verify_document(&self, token: &str, document: Upload) -> ClientResult<DetectionReport> {
        let form = Form::new().part("document", document.into_part()?);
        let request = self
            .http
            .post(self.url(routes::DOCUMENT_VERIFY))
            .bearer_auth(token)
            .multipart(form);

        let reply = self.send("document_verify", request).await?;
        Ok(DetectionReport::from_value(protected_json(&reply)?)?)
    }

    /// Compare a selfie against the photo on an ID.
    pub async fn verify_face(
        &self,
        token: &str,
        selfie: Upload,
        id_photo: Upload,
    ) -> ClientResult<DetectionReport> {
        let form = Form::new()
            .part("selfie", selfie.into_part()?)
            .part("id_photo", id_photo.into_part()?);
        let request = self
            .http
            .post(self.url(routes::FACE_VERIFY))
            .bearer_auth(token)
            .multipart(form);

        let reply = self.send("face_verify", request).await?;
        Ok(DetectionReport::from_value(protected_json(&reply)?)?)
    }

    // =========================================================================
    // Feedback and contact
    // =========================================================================

    /// Rate a verification result.
    pub async fn submit_feedback(
        &self,
        token: &str,
        feedback: &FeedbackRequest,
    ) -> ClientResult<FeedbackResponse> {
        let request = self
            .http
            .post(self.url(routes::BETA_FEEDBACK))
            .bearer_auth(token)
            .json(feedback);

        let reply = self.send("beta_feedback", request).await?;
        if reply.status == 401 {
            return Err(ClientError::SessionExpired);
        }

        let parsed = reply.parsed();
        let response: FeedbackResponse = parsed
            .clone()
            .into_json()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        if reply.is_success() && response.success {
            Ok(response)
        } else {
            let detail = response
                .detail
                .or_else(|| error_detail(&parsed))
                .unwrap_or_else(|| FEEDBACK_FAILED.to_string());
            Err(ClientError::server(reply.status, detail))
        }
    }

    /// Send the public contact / demo request form.
    pub async fn submit_contact(&self, submission: &ContactSubmission) -> ClientResult<ContactResponse> {
        submission.validate().map_err(ClientError::Validation)?;

        let request = self.http.post(self.url(routes::CONTACT_SUBMIT)).json(submission);
        let reply = self.send("contact_submit", request).await?;

        let parsed = reply.parsed();
        let response: ContactResponse = parsed
            .clone()
            .into_json()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        if reply.is_success() && response.success {
            Ok(response)
        } else {
            let detail = response
                .detail
                .or_else(|| error_detail(&parsed))
                .unwrap_or_else(|| CONTACT_FAILED.to_string());
            Err(ClientError::server(reply.status, detail))
        }
    }
}

// =============================================================================
// Response helpers
// =============================================================================

fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown error")
}

fn server_error(reply: &HttpReply) -> ClientError {
    let detail = error_detail(&reply.parsed()).unwrap_or_else(|| status_reason(reply.status).to_string());
    ClientError::server(reply.status, detail)
}

fn token_response(reply: &HttpReply) -> ClientResult<AccessTokenResponse> {
    let body = reply
        .parsed()
        .into_json()
        .ok_or_else(|| ClientError::invalid_response("token response is not JSON"))?;
    let response: AccessTokenResponse = serde_json::from_value(body)?;

    if response.token().is_none() {
        return Err(ClientError::invalid_response("token response has no access_token"));
    }

    Ok(response)
}

/// JSON body of a protected call, mapping auth and server failures.
fn protected_json(reply: &HttpReply) -> ClientResult<Value> {
    if reply.status == 401 {
        return Err(ClientError::SessionExpired);
    }

    if !reply.is_success() {
        return Err(server_error(reply));
    }

    match reply.parsed() {
        ParsedBody::Json(value) => Ok(value),
        ParsedBody::Text(text) => Err(ClientError::invalid_response(text)),
        ParsedBody::Empty => Err(ClientError::invalid_response("empty response body")),
    }
}
