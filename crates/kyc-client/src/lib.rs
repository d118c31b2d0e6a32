//! Client for the KYC Shield verification API.
//!
//! This crate provides:
//! - An HTTP client with a cookie store for the refresh cookie
//! - A session manager that bootstraps an access token once per session
//! - A poller that follows asynchronous video jobs to completion
//! - The dashboard workflow built on top of them

pub mod body;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod poller;
pub mod session;

pub use body::{HttpReply, ParsedBody};
pub use client::{routes, ApiClient, Upload};
pub use config::{ClientConfig, PollConfig};
pub use dashboard::{AnalysisOutcome, AnalysisResult, Dashboard, FEEDBACK_THANKS};
pub use error::{ClientError, ClientResult};
pub use poller::{JobPoller, JobStatusSource, PollOutcome, VideoJobStatus};
pub use session::{RefreshProvider, SessionManager, SessionSnapshot};
