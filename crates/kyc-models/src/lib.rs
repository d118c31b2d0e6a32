//! Shared wire models for the KYC Shield client.
//!
//! This crate provides Serde-serializable types for:
//! - Login and refresh token exchange
//! - Asynchronous video job status
//! - Verification reports and verdicts
//! - Beta feedback and contact form submissions

pub mod auth;
pub mod contact;
pub mod feedback;
pub mod job_status;
pub mod verification;

// Re-export common types
pub use auth::{AccessTokenResponse, LoginRequest};
pub use contact::{ContactResponse, ContactSubmission};
pub use feedback::{FeedbackChoice, FeedbackRequest, FeedbackResponse};
pub use job_status::{JobId, JobState, JobStatus, JobStatusResponse};
pub use verification::{AnalysisKind, DetectionReport, UsageLogId, Verdict, VideoSubmission};
