//! Terminal rendering of the tracking view.
//!
//! Every function returns plain `String`s so the layout can be tested
//! without a terminal. Colour is applied through [`Palette`], which is a
//! no-op when disabled.

use std::fmt::Write as _;

use manimgen_client::session::TrackingView;
use manimgen_core::event_log::LogEntry;
use manimgen_core::plan::{Chapter, PlanView, Scene};

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";

/// ANSI styling, or none at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub const PLAIN: Palette = Palette { enabled: false };
    pub const ANSI: Palette = Palette { enabled: true };

    fn paint(self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    pub fn dim(self, text: &str) -> String {
        self.paint(DIM, text)
    }

    pub fn bold(self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    pub fn success(self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    pub fn warn(self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    pub fn accent(self, text: &str) -> String {
        self.paint(MAGENTA, text)
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Project line with status badge, plus the short session id.
pub fn header(view: &TrackingView<'_>, palette: Palette) -> String {
    format!(
        "{} {}  [{}]\n{} {}\n",
        palette.bold("Project:"),
        view.job_id,
        palette.warn(view.status.label()),
        palette.dim("Session ID:"),
        view.job_id.short(),
    )
}

/// One event log line: dimmed timestamp, message highlighted on success.
pub fn log_line(entry: &LogEntry, palette: Palette) -> String {
    let (time, message) = entry.segments();
    let message = if entry.is_success() {
        palette.success(message)
    } else {
        message.to_string()
    };
    format!("{} {message}", palette.dim(&time))
}

pub fn video(url: Option<&str>, palette: Palette) -> String {
    match url {
        Some(url) => format!("{} {}\n", palette.bold("Video:"), palette.success(url)),
        None => format!("{} {}\n", palette.bold("Video:"), palette.dim("Preview Rendering...")),
    }
}

/// The scene plan in whichever fidelity it is available.
pub fn plan(view: &PlanView, palette: Palette) -> String {
    let mut out = String::new();
    match view {
        PlanView::Waiting => {
            let _ = writeln!(
                out,
                "{} {}",
                palette.bold("Scene plan:"),
                palette.dim("waiting for the planner...")
            );
        }
        PlanView::RawText { text, reason } => {
            let _ = writeln!(
                out,
                "{} {}",
                palette.bold("Scene plan"),
                palette.warn(&format!("[raw text: {}]", reason.tag())),
            );
            for line in text.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
        PlanView::Structured(scene_plan) => {
            let _ = writeln!(
                out,
                "{} {} chapters, {} scenes, ~{}",
                palette.bold("Scene plan:"),
                scene_plan.chapter_count(),
                scene_plan.scene_count(),
                seconds(scene_plan.total_duration_seconds()),
            );
            for chapter in &scene_plan.chapters {
                write_chapter(&mut out, chapter, palette);
            }
        }
    }
    out
}

/// Final one-line summary once tracking ends.
pub fn summary(view: &TrackingView<'_>, palette: Palette) -> String {
    match view.video_url {
        Some(url) => format!("{} {url}\n", palette.success("Done. Video:")),
        None => format!(
            "{} {} ({})\n",
            palette.warn("Stopped tracking"),
            view.job_id,
            view.status.label()
        ),
    }
}

fn write_chapter(out: &mut String, chapter: &Chapter, palette: Palette) {
    let title = if chapter.title.is_empty() {
        "(untitled)"
    } else {
        &chapter.title
    };
    let _ = writeln!(
        out,
        "\n{} {}",
        palette.accent(&format!("Chapter {}:", chapter.index)),
        palette.bold(title)
    );
    if !chapter.purpose.is_empty() {
        let _ = writeln!(out, "  {}", palette.dim(&chapter.purpose));
    }
    for (n, scene) in chapter.scenes.iter().enumerate() {
        write_scene(out, chapter.index, n + 1, scene, palette);
    }
    if let Some(bridge) = &chapter.next_bridge {
        let _ = writeln!(out, "  {} {}", palette.dim("Next:"), bridge);
    }
}

fn write_scene(out: &mut String, chapter: u64, number: usize, scene: &Scene, palette: Palette) {
    let duration = scene
        .estimated_duration_seconds
        .map(|s| format!(" ({})", seconds(s)))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "  Scene {chapter}.{number}  {}{}",
        palette.bold(&scene.title),
        palette.dim(&duration)
    );
    if !scene.core_concept.is_empty() {
        let _ = writeln!(out, "    Concept: {}", scene.core_concept);
    }
    if !scene.visual_plan.is_empty() {
        let _ = writeln!(out, "    Visual: {}", scene.visual_plan);
    }
    if !scene.narration.is_empty() {
        let _ = writeln!(out, "    Narration:");
        for line in scene.narration.lines() {
            let _ = writeln!(out, "      - {line}");
        }
    }
}

/// `5.0` -> `5s`, `42.5` -> `42.5s`.
fn seconds(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{secs:.0}s")
    } else {
        format!("{secs:.1}s")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
