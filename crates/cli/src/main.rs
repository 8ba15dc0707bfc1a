//! `manimgen` -- submit a video prompt and follow its generation.
//!
//! With no subcommand (or `generate` without a prompt) the prompt is read
//! from stdin. `track <ID>` follows an existing job. Ctrl-C stops polling.
//!
//! # Environment variables
//!
//! | Variable                 | Required | Default | Description                               |
//! |--------------------------|----------|---------|-------------------------------------------|
//! | `MANIMGEN_API_URL`       | yes*     | --      | Backend base URL (*or pass `--api-url`)   |
//! | `PLAN_POLL_INTERVAL_MS`  | no       | `2000`  | Milliseconds between scene plan polls     |
//! | `VIDEO_POLL_INTERVAL_MS` | no       | `3000`  | Milliseconds between video polls          |
//! | `POLL_NOT_FOUND_LIMIT`   | no       | --      | Give up after this many not-found replies |
//! | `RUST_LOG`               | no       | --      | Diagnostic filter (written to stderr)     |

use std::io::IsTerminal;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use manimgen_cli::flow::{self, EntryOutcome};
use manimgen_cli::view::Palette;
use manimgen_client::api::{GenerationApi, GenerationBackend};
use manimgen_client::config::{ClientConfig, API_URL_VAR};
use manimgen_client::session::TrackingSession;
use manimgen_client::submission::Submitter;
use manimgen_core::event_log::EventLog;
use manimgen_core::types::JobId;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "manimgen", version, about = "Turn a prompt into an animated explainer video")]
struct Cli {
    /// Backend base URL; overrides MANIMGEN_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Disable coloured output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a prompt and track the resulting job.
    Generate {
        /// The video idea. Read from stdin when omitted.
        prompt: Vec<String>,
    },
    /// Track an existing job by id.
    Track { id: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manimgen_cli=info,manimgen_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.api_url {
        Some(url) => ClientConfig::from_lookup(|var| match var {
            API_URL_VAR => Some(url.clone()),
            _ => std::env::var(var).ok(),
        })?,
        None => ClientConfig::from_env()?,
    };

    let palette = if !cli.no_color && std::io::stdout().is_terminal() {
        Palette::ANSI
    } else {
        Palette::PLAIN
    };

    tracing::info!(api_url = %config.api_url, "Using generation backend");
    let backend: Arc<dyn GenerationBackend> = Arc::new(GenerationApi::new(&config.api_url));
    let mut stdout = std::io::stdout();

    let (job_id, log) = match cli.command {
        Some(Command::Track { id }) => (JobId::parse(&id)?, EventLog::new()),
        Some(Command::Generate { prompt }) => {
            match submit(&backend, Some(prompt.join(" ")), &mut stdout, palette).await? {
                Some(entry) => entry,
                None => return Ok(()),
            }
        }
        None => match submit(&backend, None, &mut stdout, palette).await? {
            Some(entry) => entry,
            None => return Ok(()),
        },
    };

    let mut session = TrackingSession::start(job_id, backend, config.tracking, log);
    flow::track(&mut session, &mut stdout, palette, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    Ok(())
}

/// Run the entry screen; `None` means the user quit.
async fn submit(
    backend: &Arc<dyn GenerationBackend>,
    prompt: Option<String>,
    out: &mut std::io::Stdout,
    palette: Palette,
) -> anyhow::Result<Option<(JobId, EventLog)>> {
    let submitter = Submitter::new(Arc::clone(backend));
    let mut input = BufReader::new(tokio::io::stdin());
    match flow::enter(&submitter, prompt, &mut input, out, palette).await? {
        EntryOutcome::Submitted { job, log } => {
            tracing::debug!(job_id = %job.id, prompt = %job.prompt, "Entering tracking view");
            Ok(Some((job.id, log)))
        }
        EntryOutcome::Quit => Ok(None),
    }
}
