// Per-node-kind processors and their registry.
//
// A processor reads its own JSON payload, resolves its input from the
// upstream list (falling back to the manually entered field), makes a
// bounded number of external calls through the retry wrapper, and returns a
// merged value that preserves unrelated sibling fields. Errors propagate
// unchanged to the caller; nothing is swallowed here.

pub mod analysis;
pub mod generators;
pub mod image;
pub mod text;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::models::schema::{DownloadData, Node, NodeKind};
use crate::node_graph::upstream::UpstreamValue;
use crate::services::GenerationService;
use crate::storage::CacheSink;

pub struct ProcessorContext<'a> {
    pub node: &'a Node,
    pub upstream: &'a [UpstreamValue],
    /// Side channel for full-resolution outputs; thumbnails go into the
    /// returned value instead.
    pub cache: &'a CacheSink<'a>,
    pub service: &'a dyn GenerationService,
}

pub struct ProcessorOutput {
    /// Replaces the node's stored value wholesale when present.
    pub value: Option<String>,
    pub download: Option<DownloadData>,
}

impl ProcessorOutput {
    pub fn value(value: String) -> Self {
        Self {
            value: Some(value),
            download: None,
        }
    }

    pub fn with_download(mut self, download: DownloadData) -> Self {
        self.download = Some(download);
        self
    }
}

#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError>;
}

/// Kinds not in the registry are inert for chain execution (pass-through
/// sources).
pub fn get_processor(kind: NodeKind) -> Option<&'static dyn Processor> {
    match kind {
        NodeKind::EnhancePrompt => Some(&text::ENHANCE),
        NodeKind::SanitizePrompt => Some(&text::SANITIZE),
        NodeKind::TranslatePrompt => Some(&text::TRANSLATE),
        NodeKind::DescribeImage => Some(&analysis::DESCRIBE_IMAGE),
        NodeKind::AnalyzePrompt => Some(&analysis::ANALYZE_PROMPT),
        NodeKind::CharacterAnalyzer => Some(&analysis::CHARACTER_ANALYZER),
        NodeKind::ScriptGenerator => Some(&generators::SCRIPT),
        NodeKind::CharacterGenerator => Some(&generators::CHARACTERS),
        NodeKind::ImageOutput => Some(&image::IMAGE_OUTPUT),
        NodeKind::ImageEditor => Some(&image::IMAGE_EDITOR),
        NodeKind::VideoOutput => Some(&image::VIDEO_OUTPUT),
        NodeKind::Prompt
        | NodeKind::ImageInput
        | NodeKind::Note
        | NodeKind::Reroute
        | NodeKind::DataReader
        | NodeKind::SequenceGenerator => None,
    }
}

/// Joined upstream text, or the manually entered fallback when no upstream
/// connection provides any.
pub(crate) fn resolve_text_input(upstream: &[UpstreamValue], fallback: &str) -> String {
    let texts = UpstreamValue::texts(upstream);
    if texts.is_empty() {
        fallback.to_string()
    } else {
        texts.join("\n\n")
    }
}
