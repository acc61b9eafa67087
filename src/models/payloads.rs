// Per-kind JSON payloads carried inside `Node::value`.
//
// Every payload flattens unrecognized fields into `rest` so that a processor
// rewriting its own fields round-trips sibling configuration untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::models::schema::ImageRef;

/// Parse a node value. An empty value is treated as the payload's default
/// rather than a parse error so freshly created nodes are executable.
pub fn parse_payload<T>(value: &str) -> Result<T, EngineError>
where
    T: DeserializeOwned + Default,
{
    if value.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(value)
        .map_err(|e| EngineError::Parse(format!("Failed to parse node value: {}", e)))
}

pub fn serialize_payload<T: Serialize>(payload: &T) -> Result<String, EngineError> {
    serde_json::to_string(payload)
        .map_err(|e| EngineError::Parse(format!("Failed to serialize node value: {}", e)))
}

/// Prompt nodes and text transforms. `input` is the manually typed fallback
/// used when no upstream connection exists; `text` is the transform output
/// (or the source text for plain prompt nodes).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TextPayload {
    pub text: String,
    pub input: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageInputPayload {
    pub image: Option<ImageRef>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Analyzers: text or image in, structured JSON out.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisPayload {
    pub input: String,
    pub analysis: Option<Value>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Script generator: scenes accumulate across runs.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptPayload {
    pub premise: String,
    pub scene_count: u32,
    pub scenes: Vec<Value>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Character generator: characters accumulate across runs.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterPayload {
    pub brief: String,
    pub characters: Vec<Value>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OutpaintingSettings {
    pub enabled: bool,
    /// User template containing the `{prompt}` placeholder. Empty means the
    /// built-in background-fill instruction.
    pub template: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageOutputPayload {
    pub prompt: String,
    pub aspect_ratio: String,
    pub model: String,
    pub resolution: Option<String>,
    pub thumbnail: Option<String>,
    pub reformat_references: bool,
    pub outpainting: OutpaintingSettings,
    pub auto_download: bool,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoOutputPayload {
    pub prompt: String,
    pub aspect_ratio: String,
    pub resolution: String,
    pub video_url: Option<String>,
    pub auto_download: bool,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Per-frame slot status. `Done` implies a full-resolution asset exists in
/// the frame cache at the sequence offset unless the cache was cleared.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    #[default]
    Idle,
    Pending,
    Generating,
    Done,
    Error,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameSlot {
    pub status: FrameStatus,
    pub thumbnail: Option<String>,
}

/// Reference-image resolution mode for sequence runs. Exactly one mode is
/// active at a time; illegal combinations are unrepresentable.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SequenceMode {
    /// One positional primary image, index-aligned with the frame.
    #[default]
    Off,
    /// Positional primary image plus the whole secondary list per frame.
    Combination,
    /// Positional primary image; prompts come per frame.
    PromptPerFrame,
    /// The entire secondary list is the shared reference set for every frame.
    EditingWithSharedPrompts,
}

/// Payload for sequence-capable nodes (image editor, sequence generator).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SequencePayload {
    /// Global per-node prompt; lowest precedence.
    pub prompt: String,
    /// Locally edited per-frame prompts; empty string means unset.
    pub frame_prompts: Vec<String>,
    pub sequence_outputs: Vec<FrameSlot>,
    pub mode: SequenceMode,
    /// When set, generic (non-JSON) upstream text is concatenated after the
    /// resolved structured prompt.
    pub append_upstream_text: bool,
    pub aspect_ratio: String,
    pub model: String,
    pub resolution: Option<String>,
    pub outpainting: OutpaintingSettings,
    pub auto_download: bool,
    /// Primary single-edit output thumbnail (chain execution path).
    pub thumbnail: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl SequencePayload {
    /// Grow the slot list so `index` is addressable.
    pub fn ensure_slot(&mut self, index: usize) -> &mut FrameSlot {
        if self.sequence_outputs.len() <= index {
            self.sequence_outputs
                .resize_with(index + 1, FrameSlot::default);
        }
        &mut self.sequence_outputs[index]
    }
}
