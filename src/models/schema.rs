// Serializable schema shared between the engine and the canvas front end.
// Wire names are camelCase to match the saved-canvas format.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    // Pass-through sources; never executed by the chain.
    Prompt,
    ImageInput,
    Note,
    Reroute,
    DataReader,
    // Text transforms.
    EnhancePrompt,
    SanitizePrompt,
    TranslatePrompt,
    // Analysis.
    DescribeImage,
    AnalyzePrompt,
    CharacterAnalyzer,
    // Generators (structured output, appended to existing arrays).
    ScriptGenerator,
    CharacterGenerator,
    // Image / video producers.
    ImageOutput,
    ImageEditor,
    SequenceGenerator,
    VideoOutput,
}

impl NodeKind {
    /// Pass-through kinds carry data but have no processor; chain execution
    /// skips them.
    pub fn is_pass_through(&self) -> bool {
        matches!(
            self,
            NodeKind::Prompt
                | NodeKind::ImageInput
                | NodeKind::Note
                | NodeKind::Reroute
                | NodeKind::DataReader
        )
    }

    /// Kinds whose frames are driven by the sequence engine.
    pub fn is_sequence_capable(&self) -> bool {
        matches!(self, NodeKind::ImageEditor | NodeKind::SequenceGenerator)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// A canvas node. `value` is the single source of truth for the node's
/// configuration and lightweight outputs (thumbnails, never full-res assets).
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub value: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub size: Size,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            value: value.into(),
            position: Position::default(),
            size: Size::default(),
        }
    }
}

/// Directed edge. Multiple inbound connections to one handle resolve as an
/// ordered list in connection-array order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from_node_id: String,
    pub to_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_handle_id: Option<String>,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_node_id: from.into(),
            to_node_id: to.into(),
            to_handle_id: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.to_handle_id = Some(handle.into());
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

/// Inline image reference flowing between nodes and into the generation
/// service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub base64_image_data: String,
    pub mime_type: String,
}

/// Live registry entry for in-flight work. Existence alone signals "this
/// node is busy"; removed unconditionally when the run settles.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActiveOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub description: String,
    pub tab_id: String,
    pub tab_name: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    Image,
    Video,
}

/// Side-effect instruction returned by image/video producers; not part of
/// node state.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DownloadData {
    pub url: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: DownloadKind,
}
