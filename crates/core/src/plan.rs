//! Scene plan view model and its builder.
//!
//! The plan generator stores its output as free text. When the upstream
//! model behaved, that text is a JSON array of chapter objects, each with
//! an ordered list of scenes:
//!
//! ```json
//! [{
//!   "chunk_index": 1,
//!   "chunk_title": "Intro",
//!   "chunk_purpose": "Set the stage",
//!   "scenes": [{
//!     "scene_id": "chunk_1_scene_1",
//!     "scene_title": "Open",
//!     "visual_plan": "fade in",
//!     "narration_flow": ["Hello"],
//!     "estimated_duration_seconds": 5
//!   }]
//! }]
//! ```
//!
//! Nothing about that shape is guaranteed, so [`render`] walks a fallback
//! ladder and always produces a displayable [`PlanView`]:
//!
//! 1. absent payload -> [`PlanView::Waiting`]
//! 2. payload starting with `[` or `{` -> strict JSON parse; an array
//!    becomes [`PlanView::Structured`]
//! 3. anything else -> [`PlanView::RawText`] carrying the text verbatim,
//!    tagged with why structured display was not possible.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

/// Narration body of a scene.
///
/// The generator emits either a list of narration steps or a single
/// paragraph; both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Narration {
    Lines(Vec<String>),
    Single(String),
}

impl Narration {
    /// Narration as ordered lines. A single paragraph yields one line.
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Narration::Lines(lines) => lines.iter().map(String::as_str).collect(),
            Narration::Single(text) => vec![text.as_str()],
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Narration::Lines(lines) => lines.is_empty(),
            Narration::Single(text) => text.is_empty(),
        }
    }
}

impl Default for Narration {
    fn default() -> Self {
        Narration::Lines(Vec::new())
    }
}

/// One scene of a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Scene {
    pub scene_id: Option<String>,
    pub title: String,
    pub core_concept: String,
    /// Estimated on-screen duration in seconds, when the plan gave a number.
    pub estimated_duration_seconds: Option<f64>,
    pub visual_plan: String,
    pub narration: Narration,
    pub visual_elements: Vec<String>,
}

/// One chapter ("chunk") of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Chapter {
    /// 1-based chapter number. Falls back to the chapter's position when
    /// the payload has no usable `chunk_index`.
    pub index: u64,
    pub title: String,
    pub purpose: String,
    /// Teaser linking to the next chapter, if the generator wrote one.
    pub next_bridge: Option<String>,
    pub scenes: Vec<Scene>,
}

/// Ordered chapters of a structured scene plan.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ScenePlan {
    pub chapters: Vec<Chapter>,
}

impl ScenePlan {
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn scene_count(&self) -> usize {
        self.chapters.iter().map(|c| c.scenes.len()).sum()
    }

    /// Sum of every scene's estimated duration. Scenes without an estimate
    /// contribute nothing.
    pub fn total_duration_seconds(&self) -> f64 {
        self.chapters
            .iter()
            .flat_map(|c| c.scenes.iter())
            .filter_map(|s| s.estimated_duration_seconds)
            .sum()
    }
}

/// Why a payload is shown as raw text instead of a structured plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The payload does not start with `[` or `{`; no parse was attempted.
    NotJsonShaped,
    /// The payload looked like JSON but was malformed or not an array.
    ParseError(String),
}

impl FallbackReason {
    /// Tag shown next to the raw text so the two cases are distinguishable.
    pub fn tag(&self) -> &'static str {
        match self {
            FallbackReason::NotJsonShaped => "not JSON-shaped",
            FallbackReason::ParseError(_) => "parse error",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NotJsonShaped => f.write_str(self.tag()),
            FallbackReason::ParseError(detail) => write!(f, "{}: {detail}", self.tag()),
        }
    }
}

/// Render-ready state of the plan resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanView {
    /// No plan yet; the expected state before the plan resource settles.
    Waiting,
    /// The payload could not be shown as a plan and is displayed verbatim.
    RawText { text: String, reason: FallbackReason },
    /// A parsed chapter/scene tree.
    Structured(ScenePlan),
}

impl PlanView {
    pub fn is_structured(&self) -> bool {
        matches!(self, PlanView::Structured(_))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build the view model for a plan payload. Never fails.
pub fn render(raw: Option<&str>) -> PlanView {
    let Some(raw) = raw else {
        return PlanView::Waiting;
    };

    let trimmed = raw.trim_start();
    if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
        return raw_text(raw, FallbackReason::NotJsonShaped);
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => PlanView::Structured(build_plan(&items)),
        Ok(other) => raw_text(
            raw,
            FallbackReason::ParseError(format!("expected a JSON array, found {}", kind_of(&other))),
        ),
        Err(e) => raw_text(raw, FallbackReason::ParseError(e.to_string())),
    }
}

fn raw_text(raw: &str, reason: FallbackReason) -> PlanView {
    PlanView::RawText {
        text: raw.to_string(),
        reason,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn build_plan(items: &[Value]) -> ScenePlan {
    let chapters = items
        .iter()
        .enumerate()
        .map(|(position, item)| build_chapter(position, item))
        .collect();
    ScenePlan { chapters }
}

fn build_chapter(position: usize, item: &Value) -> Chapter {
    let empty = Map::new();
    let fields = item.as_object().unwrap_or(&empty);

    let index = fields
        .get("chunk_index")
        .and_then(Value::as_u64)
        .unwrap_or(position as u64 + 1);

    let scenes = fields
        .get("scenes")
        .and_then(Value::as_array)
        .map(|scenes| scenes.iter().map(build_scene).collect())
        .unwrap_or_default();

    Chapter {
        index,
        title: text_field(fields, "chunk_title"),
        purpose: text_field(fields, "chunk_purpose"),
        next_bridge: optional_text(fields, "next_chunk_bridge"),
        scenes,
    }
}

fn build_scene(item: &Value) -> Scene {
    let empty = Map::new();
    let fields = item.as_object().unwrap_or(&empty);

    Scene {
        scene_id: optional_text(fields, "scene_id"),
        title: text_field(fields, "scene_title"),
        core_concept: text_field(fields, "core_concept"),
        estimated_duration_seconds: fields.get("estimated_duration_seconds").and_then(duration),
        visual_plan: text_field(fields, "visual_plan"),
        narration: fields.get("narration_flow").map(narration).unwrap_or_default(),
        visual_elements: fields
            .get("visual_elements")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(display_text).collect())
            .unwrap_or_default(),
    }
}

fn narration(value: &Value) -> Narration {
    match value {
        Value::Null => Narration::default(),
        Value::Array(items) => Narration::Lines(items.iter().map(display_text).collect()),
        other => serde_json::from_value(other.clone())
            .unwrap_or_else(|_| Narration::Single(display_text(other))),
    }
}

/// Numbers are taken as-is; numeric strings such as `"45"` are accepted too.
fn duration(value: &Value) -> Option<f64> {
    let secs: f64 = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    secs.is_finite().then_some(secs)
}

fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    optional_text(fields, key).unwrap_or_default()
}

fn optional_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::Null => None,
        other => Some(display_text(other)),
    }
}

/// Strings are used verbatim; other JSON values keep their JSON text.
fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const SINGLE_CHAPTER: &str = r#"[{"chunk_title":"Intro","scenes":[{"scene_title":"Open","estimated_duration_seconds":5,"visual_plan":"fade in","narration_flow":["Hello"]}]}]"#;

    fn structured(raw: &str) -> ScenePlan {
        match render(Some(raw)) {
            PlanView::Structured(plan) => plan,
            other => panic!("Expected Structured, got {other:?}"),
        }
    }

    // -- ladder --------------------------------------------------------------

    #[test]
    fn absent_payload_is_waiting() {
        assert_eq!(render(None), PlanView::Waiting);
    }

    #[test]
    fn single_chapter_plan() {
        let plan = structured(SINGLE_CHAPTER);
        assert_eq!(plan.chapter_count(), 1);

        let chapter = &plan.chapters[0];
        assert_eq!(chapter.title, "Intro");
        assert_eq!(chapter.index, 1);
        assert_eq!(chapter.scenes.len(), 1);

        let scene = &chapter.scenes[0];
        assert_eq!(scene.title, "Open");
        assert_eq!(scene.estimated_duration_seconds, Some(5.0));
        assert_eq!(scene.visual_plan, "fade in");
        assert_eq!(scene.narration.lines(), vec!["Hello"]);
    }

    #[test]
    fn free_text_is_not_json_shaped() {
        let view = render(Some("just some free text"));
        assert_matches!(
            view,
            PlanView::RawText { ref text, reason: FallbackReason::NotJsonShaped }
                if text == "just some free text"
        );
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let view = render(Some("{not valid json"));
        assert_matches!(
            view,
            PlanView::RawText { ref text, reason: FallbackReason::ParseError(_) }
                if text == "{not valid json"
        );
    }

    #[test]
    fn fallback_tags_are_distinct() {
        let free = FallbackReason::NotJsonShaped;
        let broken = FallbackReason::ParseError("eof".into());
        assert_ne!(free.tag(), broken.tag());
        assert_eq!(broken.to_string(), "parse error: eof");
    }

    #[test]
    fn object_instead_of_array_is_parse_error() {
        let view = render(Some(r#"{"chunk_title":"Intro","scenes":[]}"#));
        assert_matches!(
            view,
            PlanView::RawText { reason: FallbackReason::ParseError(ref detail), .. }
                if detail.contains("an object")
        );
    }

    #[test]
    fn truncated_array_is_parse_error() {
        let raw = &SINGLE_CHAPTER[..SINGLE_CHAPTER.len() - 10];
        assert_matches!(
            render(Some(raw)),
            PlanView::RawText { reason: FallbackReason::ParseError(_), .. }
        );
    }

    #[test]
    fn concatenated_chunks_are_parse_error() {
        let raw = format!("{SINGLE_CHAPTER}\n{SINGLE_CHAPTER}");
        assert_matches!(
            render(Some(&raw)),
            PlanView::RawText { reason: FallbackReason::ParseError(_), .. }
        );
    }

    #[test]
    fn raw_text_is_kept_verbatim() {
        let raw = "  line one\n\tline two  ";
        assert_matches!(render(Some(raw)), PlanView::RawText { ref text, .. } if text == raw);
    }

    #[test]
    fn leading_whitespace_before_json_is_accepted() {
        let raw = format!("\n   {SINGLE_CHAPTER}");
        assert_eq!(structured(&raw).chapter_count(), 1);
    }

    #[test]
    fn empty_string_is_not_json_shaped() {
        assert_matches!(
            render(Some("")),
            PlanView::RawText { reason: FallbackReason::NotJsonShaped, .. }
        );
    }

    #[test]
    fn empty_array_is_an_empty_plan() {
        let plan = structured("[]");
        assert_eq!(plan.chapter_count(), 0);
        assert_eq!(plan.scene_count(), 0);
    }

    // -- field handling ------------------------------------------------------

    #[test]
    fn missing_chunk_index_defaults_to_position() {
        let plan = structured(r#"[{"chunk_title":"A"},{"chunk_title":"B"},{"chunk_index":7}]"#);
        let indices: Vec<u64> = plan.chapters.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 7]);
    }

    #[test]
    fn narration_as_single_string() {
        let plan = structured(r#"[{"scenes":[{"narration_flow":"One paragraph."}]}]"#);
        let narration = &plan.chapters[0].scenes[0].narration;
        assert_eq!(narration, &Narration::Single("One paragraph.".into()));
        assert_eq!(narration.lines(), vec!["One paragraph."]);
    }

    #[test]
    fn narration_missing_is_empty() {
        let plan = structured(r#"[{"scenes":[{"scene_title":"Quiet"}]}]"#);
        assert!(plan.chapters[0].scenes[0].narration.is_empty());
    }

    #[test]
    fn narration_with_non_string_items() {
        let plan = structured(r#"[{"scenes":[{"narration_flow":["a", 2, null]}]}]"#);
        assert_eq!(plan.chapters[0].scenes[0].narration.lines(), vec!["a", "2", "null"]);
    }

    #[test]
    fn numeric_string_duration_is_accepted() {
        let plan = structured(r#"[{"scenes":[{"estimated_duration_seconds":"45"}]}]"#);
        assert_eq!(plan.chapters[0].scenes[0].estimated_duration_seconds, Some(45.0));
    }

    #[test]
    fn non_numeric_duration_is_absent() {
        let plan = structured(r#"[{"scenes":[{"estimated_duration_seconds":"soon"}]}]"#);
        assert_eq!(plan.chapters[0].scenes[0].estimated_duration_seconds, None);
    }

    #[test]
    fn non_object_elements_become_empty_entries() {
        let plan = structured(r#"[42, {"scenes":["oops"]}]"#);
        assert_eq!(plan.chapter_count(), 2);
        assert_eq!(plan.chapters[0].index, 1);
        assert!(plan.chapters[0].title.is_empty());
        assert_eq!(plan.chapters[1].scenes.len(), 1);
        assert!(plan.chapters[1].scenes[0].title.is_empty());
    }

    #[test]
    fn extended_fields_are_carried() {
        let raw = r#"[{
            "chunk_index": 2,
            "chunk_title": "Depth",
            "chunk_purpose": "Go deeper",
            "next_chunk_bridge": "Next: applications",
            "scenes": [{
                "scene_id": "chunk_2_scene_1",
                "scene_title": "Forces",
                "core_concept": "Newton's second law",
                "visual_plan": "arrows grow",
                "narration_flow": ["F equals m a", "Watch the arrow"],
                "visual_elements": ["Arrow", "MathTex"],
                "estimated_duration_seconds": 42.5
            }]
        }]"#;
        let plan = structured(raw);
        let chapter = &plan.chapters[0];
        assert_eq!(chapter.index, 2);
        assert_eq!(chapter.purpose, "Go deeper");
        assert_eq!(chapter.next_bridge.as_deref(), Some("Next: applications"));

        let scene = &chapter.scenes[0];
        assert_eq!(scene.scene_id.as_deref(), Some("chunk_2_scene_1"));
        assert_eq!(scene.core_concept, "Newton's second law");
        assert_eq!(scene.visual_elements, vec!["Arrow", "MathTex"]);
        assert_eq!(scene.narration.lines().len(), 2);
    }

    #[test]
    fn totals_across_chapters() {
        let raw = r#"[
            {"scenes":[{"estimated_duration_seconds":30},{"estimated_duration_seconds":15}]},
            {"scenes":[{"estimated_duration_seconds":20},{"scene_title":"no estimate"}]}
        ]"#;
        let plan = structured(raw);
        assert_eq!(plan.scene_count(), 4);
        assert_eq!(plan.total_duration_seconds(), 65.0);
    }
}
