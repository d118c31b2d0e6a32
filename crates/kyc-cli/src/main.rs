//! KYC Shield command-line client.

mod args;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kyc_client::{
    AnalysisOutcome, AnalysisResult, ApiClient, ClientConfig, Dashboard, PollConfig,
    RefreshProvider, SessionManager, Upload,
};
use kyc_models::{ContactSubmission, FeedbackRequest, JobState, UsageLogId};

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Pretty output by default, JSON with `LOG_FORMAT=json`. Logs go to stderr
/// so stdout only carries results.
fn init_tracing() -> Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("kyc=info".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .with(env_filter)
            .try_init()?;
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.override_base_url(base_url)?;
    }
    debug!(base_url = %config.base_url, "Client configured");

    let poll = config.poll;
    let api = Arc::new(ApiClient::new(config)?);

    let credentials = Credentials {
        token: cli.token,
        email: cli.email,
        password: cli.password,
    };

    match cli.command {
        Command::Video {
            file,
            interval_ms,
            timeout_ms,
        } => {
            let session = authenticate(&api, &credentials).await?;
            let poll = PollConfig::new(
                interval_ms.map(Duration::from_millis).unwrap_or(poll.interval),
                timeout_ms.map(Duration::from_millis).unwrap_or(poll.timeout),
            );
            let dashboard = Arc::new(Dashboard::new(api, session, poll));
            let upload = load(&file).await?;

            let progress = tokio::spawn(report_progress(dashboard.job_progress()));
            let outcome = with_interrupt(&dashboard, dashboard.analyze_video(upload)).await;
            progress.abort();

            print_outcome(outcome??)
        }
        Command::Document { file } => {
            let session = authenticate(&api, &credentials).await?;
            let dashboard = Dashboard::new(api, session, poll);
            let upload = load(&file).await?;
            print_outcome(dashboard.analyze_document(upload).await?)
        }
        Command::Face { selfie, id_photo } => {
            let session = authenticate(&api, &credentials).await?;
            let dashboard = Dashboard::new(api, session, poll);
            let selfie = load(&selfie).await?;
            let id_photo = load(&id_photo).await?;
            print_outcome(dashboard.analyze_face(selfie, id_photo).await?)
        }
        Command::Feedback {
            usage_log_id,
            verdict,
            actual_label,
        } => {
            let session = authenticate(&api, &credentials).await?;
            let request = FeedbackRequest {
                usage_log_id: parse_usage_log_id(&usage_log_id),
                user_feedback: verdict,
                user_actual_label: actual_label,
            };
            api.submit_feedback(&session.bearer()?, &request).await?;
            println!("{}", kyc_client::FEEDBACK_THANKS);
            Ok(())
        }
        // Public form, no session needed.
        Command::Contact {
            name,
            email,
            message,
            company,
            industry,
            form_type,
        } => {
            let submission = ContactSubmission {
                name,
                email,
                company,
                industry,
                message,
                form_type,
            };
            api.submit_contact(&submission).await?;
            println!("Thanks! We received your message and will get back to you soon.");
            Ok(())
        }
    }
}

struct Credentials {
    token: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

/// Establish a session: explicit token, then credentials, then the refresh
/// cookie.
async fn authenticate(api: &Arc<ApiClient>, credentials: &Credentials) -> Result<Arc<SessionManager>> {
    let session = Arc::new(SessionManager::new(Arc::clone(api) as Arc<dyn RefreshProvider>));

    if let Some(token) = credentials.token.as_deref().filter(|t| !t.trim().is_empty()) {
        session.login(token);
        return Ok(session);
    }

    if let (Some(email), Some(password)) = (&credentials.email, &credentials.password) {
        let response = api.login(email, password).await?;
        let token = response
            .into_token()
            .context("login response did not contain an access token")?;
        session.login(token);
        return Ok(session);
    }

    session.bootstrap().await;
    if !session.is_authenticated() {
        bail!("Not signed in. Pass --token, or --email and --password.");
    }
    Ok(session)
}

async fn load(path: &Path) -> Result<Upload> {
    Upload::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Run an analysis, clearing the dashboard on the first Ctrl-C so the upload
/// or poll stops. A second Ctrl-C gives up on waiting.
async fn with_interrupt<F, T>(dashboard: &Dashboard, analysis: F) -> Result<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::pin!(analysis);

    tokio::select! {
        result = &mut analysis => return Ok(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling analysis (press Ctrl-C again to abort)");
            dashboard.clear().await;
        }
    }

    tokio::select! {
        result = &mut analysis => Ok(result),
        _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
    }
}

async fn report_progress(mut progress: watch::Receiver<Option<JobState>>) {
    while progress.changed().await.is_ok() {
        let line = progress
            .borrow_and_update()
            .as_ref()
            .map(|state: &JobState| format!("Job {}: {} ({}s)", state.job_id, state.status, state.elapsed_secs));
        if let Some(line) = line {
            eprintln!("{}", line);
        }
    }
}

fn print_outcome(outcome: AnalysisOutcome) -> Result<()> {
    match outcome {
        AnalysisOutcome::Completed(result) => print_result(&result),
        AnalysisOutcome::Cancelled => {
            println!("Analysis cancelled.");
            Ok(())
        }
    }
}

fn print_result(result: &AnalysisResult) -> Result<()> {
    let verdict = result.verdict();
    println!("{} verdict: {}", result.kind, verdict.label);

    if let Some(confidence) = result.report.confidence {
        println!("Confidence: {:.1}%", confidence * 100.0);
    }
    if let Some(id) = &result.report.usage_log_id {
        println!("Usage log id: {} (use it with `kyc feedback`)", id);
    }

    println!("{}", serde_json::to_string_pretty(&result.report)?);
    Ok(())
}

fn parse_usage_log_id(raw: &str) -> UsageLogId {
    let raw = raw.trim();
    raw.parse::<i64>()
        .map(UsageLogId::Int)
        .unwrap_or_else(|_| UsageLogId::Text(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usage_log_id() {
        assert_eq!(parse_usage_log_id("42"), UsageLogId::Int(42));
        assert_eq!(
            parse_usage_log_id(" log-7 "),
            UsageLogId::Text("log-7".to_string())
        );
    }
}
