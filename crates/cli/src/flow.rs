//! The two screens of the client: prompt entry and job tracking.
//!
//! Both are generic over their input and output so they can be driven
//! from byte buffers in tests.

use std::future::Future;
use std::io::{self, Write};

use manimgen_client::session::{SessionUpdate, TrackingSession};
use manimgen_client::submission::{SubmitError, Submitter};
use manimgen_core::event_log::{EventLog, LogTag};
use manimgen_core::job::Job;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::view::{self, Palette};

/// How the entry screen ended.
#[derive(Debug)]
pub enum EntryOutcome {
    /// A job was created; tracking should begin with this log.
    Submitted { job: Job, log: EventLog },
    /// The user quit or input ended.
    Quit,
}

/// What to do after a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Retry,
    Back,
    Quit,
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// Collect a prompt and submit it until a job id comes back.
///
/// `initial` is used as the first prompt when non-blank; otherwise the
/// prompt is read from `input`. On failure the user may retry the same
/// prompt, go back to entering a new one, or quit.
pub async fn enter<R, W>(
    submitter: &Submitter,
    initial: Option<String>,
    input: &mut R,
    out: &mut W,
    palette: Palette,
) -> io::Result<EntryOutcome>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut pending = initial.filter(|p| !p.trim().is_empty());

    loop {
        let prompt = match pending.take() {
            Some(prompt) => prompt,
            None => {
                write!(out, "{} ", palette.bold("Describe your video idea:"))?;
                out.flush()?;
                match read_line(input).await? {
                    Some(line) => line,
                    None => return Ok(EntryOutcome::Quit),
                }
            }
        };

        loop {
            writeln!(out, "{}", palette.dim("Generating..."))?;
            match submitter.submit(&prompt).await {
                Ok(job_id) => {
                    tracing::info!(job_id = %job_id, "Job submitted");
                    let mut log = EventLog::new();
                    log.append_tagged(LogTag::Info, format_args!("Job submitted: {job_id}"));
                    let job = Job::new(job_id, prompt.trim());
                    return Ok(EntryOutcome::Submitted { job, log });
                }
                Err(SubmitError::EmptyPrompt) => {
                    writeln!(out, "{}", palette.warn("Please enter a prompt first."))?;
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Submission failed");
                    writeln!(out, "{} {e}", palette.warn("Generation Failed:"))?;
                    match ask_recovery(input, out).await? {
                        Recovery::Retry => continue,
                        Recovery::Back => break,
                        Recovery::Quit => return Ok(EntryOutcome::Quit),
                    }
                }
            }
        }
    }
}

async fn ask_recovery<R, W>(input: &mut R, out: &mut W) -> io::Result<Recovery>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        write!(out, "[r] Try again  [b] Back to start  [q] Quit: ")?;
        out.flush()?;
        let Some(answer) = read_line(input).await? else {
            return Ok(Recovery::Quit);
        };
        match answer.trim().to_ascii_lowercase().as_str() {
            "" | "r" => return Ok(Recovery::Retry),
            "b" => return Ok(Recovery::Back),
            "q" => return Ok(Recovery::Quit),
            _ => continue,
        }
    }
}

/// One line without its terminator, or `None` at end of input.
async fn read_line<R: AsyncBufRead + Unpin>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Render the tracking screen until both resources finish or `shutdown`
/// resolves, whichever comes first.
///
/// Log entries are printed as they are appended; the plan and video
/// sections are printed again when their resource settles.
pub async fn track<W, F>(
    session: &mut TrackingSession,
    out: &mut W,
    palette: Palette,
    shutdown: F,
) -> io::Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    let view = session.view();
    write!(out, "{}", view::header(&view, palette))?;
    write!(out, "{}", view::plan(view.plan, palette))?;
    write!(out, "{}", view::video(view.video_url, palette))?;
    let mut seen = print_log(session, 0, out, palette)?;

    tokio::pin!(shutdown);
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = &mut shutdown, if !interrupted => {
                interrupted = true;
                tracing::info!(job_id = %session.job_id(), "Interrupted, stopping pollers");
                session.stop();
            }
            update = session.next_update() => {
                let Some(update) = update else { break };
                seen = print_log(session, seen, out, palette)?;
                print_update(session, update, out, palette)?;
            }
        }
    }

    print_log(session, seen, out, palette)?;
    write!(out, "{}", view::summary(&session.view(), palette))?;
    out.flush()
}

fn print_update<W: Write>(
    session: &TrackingSession,
    update: SessionUpdate,
    out: &mut W,
    palette: Palette,
) -> io::Result<()> {
    let view = session.view();
    match update {
        SessionUpdate::PlanSettled => write!(out, "\n{}", view::plan(view.plan, palette))?,
        SessionUpdate::VideoSettled => write!(out, "\n{}", view::video(view.video_url, palette))?,
        SessionUpdate::Abandoned(_) => {}
    }
    writeln!(out, "{} {}", palette.dim("Status:"), palette.warn(view.status.label()))?;
    out.flush()
}

/// Print entries appended since `seen`; returns the new high-water mark.
fn print_log<W: Write>(
    session: &TrackingSession,
    seen: usize,
    out: &mut W,
    palette: Palette,
) -> io::Result<usize> {
    let log = session.log();
    for entry in log.since(seen) {
        writeln!(out, "{}", view::log_line(entry, palette))?;
    }
    Ok(log.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use manimgen_client::api::{ApiError, GenerationBackend};
    use manimgen_client::session::TrackingConfig;
    use manimgen_core::types::JobId;
    use serde_json::{json, Value};

    use super::*;

    const PLAN: &str = r#"[{"chunk_title":"Intro","scenes":[{"scene_title":"Open","estimated_duration_seconds":5}]}]"#;
    const VIDEO: &str = "https://res.cloudinary.com/demo/abc123.mp4";

    /// Backend with queued creation replies and fixed status payloads.
    struct FakeBackend {
        creates: Mutex<VecDeque<Result<Value, ApiError>>>,
        prompts: Mutex<Vec<String>>,
        plan: Option<&'static str>,
        video: Option<&'static str>,
    }

    impl FakeBackend {
        fn new(creates: Vec<Result<Value, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                creates: Mutex::new(creates.into()),
                prompts: Mutex::new(Vec::new()),
                plan: Some(PLAN),
                video: Some(VIDEO),
            })
        }

        fn pending() -> Arc<Self> {
            Arc::new(Self {
                creates: Mutex::new(VecDeque::new()),
                prompts: Mutex::new(Vec::new()),
                plan: None,
                video: None,
            })
        }
    }

    #[async_trait]
    impl GenerationBackend for FakeBackend {
        async fn create_job(&self, prompt: &str) -> Result<Value, ApiError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.creates
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({ "id": "abc123" })))
        }

        async fn fetch_plan(&self, _id: &JobId) -> Result<Option<String>, ApiError> {
            Ok(self.plan.map(str::to_string))
        }

        async fn fetch_video(&self, _id: &JobId) -> Result<Option<String>, ApiError> {
            Ok(self.video.map(str::to_string))
        }
    }

    fn server_error() -> Result<Value, ApiError> {
        Err(ApiError::Status {
            status: 500,
            body: "Failed to generate".to_string(),
        })
    }

    async fn run_entry(
        backend: Arc<FakeBackend>,
        initial: Option<&str>,
        input: &str,
    ) -> (EntryOutcome, String) {
        let submitter = Submitter::new(backend);
        let mut input = input.as_bytes();
        let mut out = Vec::new();
        let outcome = enter(
            &submitter,
            initial.map(str::to_string),
            &mut input,
            &mut out,
            Palette::PLAIN,
        )
        .await
        .unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    // -----------------------------------------------------------------------
    // Entry
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn argument_prompt_is_submitted_without_asking() {
        let backend = FakeBackend::new(vec![]);
        let (outcome, out) = run_entry(backend.clone(), Some("a bouncing ball"), "").await;

        let EntryOutcome::Submitted { job, log } = outcome else {
            panic!("expected a submission, got {outcome:?}");
        };
        assert_eq!(job.id.as_str(), "abc123");
        assert_eq!(job.prompt, "a bouncing ball");
        assert_eq!(log.entries()[0].message(), "INFO Job submitted: abc123");
        assert!(!out.contains("Describe your video idea"));
        assert_eq!(*backend.prompts.lock().unwrap(), vec!["a bouncing ball"]);
    }

    #[tokio::test]
    async fn blank_argument_falls_back_to_input() {
        let backend = FakeBackend::new(vec![]);
        let (outcome, out) = run_entry(backend.clone(), Some("   "), "a spinning cube\n").await;

        assert_matches!(outcome, EntryOutcome::Submitted { .. });
        assert!(out.contains("Describe your video idea:"));
        assert_eq!(*backend.prompts.lock().unwrap(), vec!["a spinning cube"]);
    }

    #[tokio::test]
    async fn empty_prompt_is_never_sent() {
        let backend = FakeBackend::new(vec![]);
        let (outcome, out) = run_entry(backend.clone(), None, "\n  \n").await;

        assert_matches!(outcome, EntryOutcome::Quit);
        assert!(out.contains("Please enter a prompt first."));
        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn retry_resubmits_the_same_prompt() {
        let backend = FakeBackend::new(vec![server_error()]);
        let (outcome, out) = run_entry(backend.clone(), Some("a bouncing ball"), "r\n").await;

        assert_matches!(outcome, EntryOutcome::Submitted { .. });
        assert!(out.contains("Generation Failed:"));
        assert_eq!(
            *backend.prompts.lock().unwrap(),
            vec!["a bouncing ball", "a bouncing ball"]
        );
    }

    #[tokio::test]
    async fn back_returns_to_prompt_entry() {
        let backend = FakeBackend::new(vec![server_error()]);
        let (outcome, _) = run_entry(backend.clone(), Some("first"), "b\nsecond\n").await;

        assert_matches!(outcome, EntryOutcome::Submitted { .. });
        assert_eq!(*backend.prompts.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn quit_after_failure() {
        let backend = FakeBackend::new(vec![server_error()]);
        let (outcome, _) = run_entry(backend.clone(), Some("first"), "x\nq\n").await;

        assert_matches!(outcome, EntryOutcome::Quit);
        assert_eq!(backend.prompts.lock().unwrap().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Tracking
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn tracking_renders_plan_video_and_log() {
        let mut log = EventLog::new();
        log.append_tagged(LogTag::Info, "Job submitted: abc123");
        let mut session = TrackingSession::start(
            JobId::parse("abc123").unwrap(),
            FakeBackend::new(vec![]),
            TrackingConfig::default(),
            log,
        );

        let mut out = Vec::new();
        track(&mut session, &mut out, Palette::PLAIN, std::future::pending())
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.starts_with("Project: abc123  [Processing]\nSession ID: abc123\n"));
        assert!(out.contains("Scene plan: waiting for the planner..."));
        assert!(out.contains("Video: Preview Rendering..."));
        assert!(out.contains("Chapter 1: Intro"));
        assert!(out.contains(&format!("Video: {VIDEO}")));
        assert!(out.contains("INFO Job submitted: abc123"));
        assert!(out.contains("SUCCESS Video ready"));
        assert!(out.contains("Status: Completed"));
        assert!(out.ends_with(&format!("Done. Video: {VIDEO}\n")));

        // Every log entry is printed exactly once.
        assert_eq!(out.matches("INFO Job submitted").count(), 1);
        assert_eq!(out.matches("SUCCESS Scene plan received").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_tracking() {
        let mut session = TrackingSession::start(
            JobId::parse("abc123").unwrap(),
            FakeBackend::pending(),
            TrackingConfig::default(),
            EventLog::new(),
        );

        let mut out = Vec::new();
        track(&mut session, &mut out, Palette::PLAIN, async {})
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.ends_with("Stopped tracking abc123 (Processing)\n"));
        assert!(!session.poller(manimgen_client::poller::ResourceKind::Plan).is_active());
        assert!(!session.poller(manimgen_client::poller::ResourceKind::Video).is_active());
    }
}
