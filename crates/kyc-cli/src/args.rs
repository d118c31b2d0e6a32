use std::path::PathBuf;

use clap::{Parser, Subcommand};

use kyc_models::FeedbackChoice;

/// KYC Shield CLI - verify videos, documents and faces from the terminal
#[derive(Parser, Debug)]
#[command(name = "kyc")]
#[command(author = "KYC Shield Team")]
#[command(version)]
#[command(about = "Terminal client for the KYC Shield verification API", long_about = None)]
pub struct Cli {
    /// API base URL (defaults to KYC_API_BASE_URL or the production endpoint)
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Access token to use instead of logging in
    #[arg(long = "token", env = "KYC_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Log in with this email before running the command (place before the subcommand)
    #[arg(long = "email", requires = "password")]
    pub email: Option<String>,

    /// Password for --email
    #[arg(long = "password", requires = "email")]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a video for deepfakes
    Video {
        /// Video file to upload
        file: PathBuf,

        /// Delay between job status requests in milliseconds
        #[arg(long = "interval-ms")]
        interval_ms: Option<u64>,

        /// Give up on the job after this many milliseconds
        #[arg(long = "timeout-ms")]
        timeout_ms: Option<u64>,
    },

    /// Check an identity document for fraud
    Document {
        /// Document image or PDF
        file: PathBuf,
    },

    /// Match a selfie against an ID photo
    Face {
        /// Selfie image
        selfie: PathBuf,

        /// Photo of the ID
        id_photo: PathBuf,
    },

    /// Rate a previous verification result
    Feedback {
        /// Usage log id printed with the result
        #[arg(long = "usage-log-id")]
        usage_log_id: String,

        /// correct, wrong or unsure
        #[arg(long = "verdict")]
        verdict: FeedbackChoice,

        /// What the media actually was
        #[arg(long = "actual-label")]
        actual_label: Option<String>,
    },

    /// Send the contact / demo request form
    Contact {
        #[arg(long = "name")]
        name: String,

        #[arg(long = "email")]
        email: String,

        #[arg(long = "message")]
        message: String,

        #[arg(long = "company", default_value = "")]
        company: String,

        #[arg(long = "industry", default_value = "")]
        industry: String,

        #[arg(long = "form-type", default_value = "contact")]
        form_type: String,
    },
}
