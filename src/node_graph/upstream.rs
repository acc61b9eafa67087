// Just-in-time resolution of the values flowing into a node.
//
// Upstream data is a flat ordered list of tagged values; processors narrow by
// matching on the variant. Resolution reads the *working set* (not the
// original graph) so results from earlier nodes in the same run are visible,
// and prefers full-resolution cache entries over stored thumbnails.

use std::collections::HashSet;

use crate::cache::CacheChannel;
use crate::error::EngineError;
use crate::images;
use crate::models::payloads::{
    parse_payload, AnalysisPayload, CharacterPayload, FrameStatus, ImageInputPayload,
    ScriptPayload, SequencePayload, TextPayload,
};
use crate::models::schema::{ImageRef, Node, NodeKind};
use crate::node_graph::state::WorkingSet;
use crate::storage::TabStore;

/// Handle id of the secondary (Input-B) image input on sequence-capable
/// nodes. Connections without a handle feed the primary input.
pub const REFERENCE_HANDLE: &str = "reference";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamValue {
    Text(String),
    Image(ImageRef),
}

impl UpstreamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            UpstreamValue::Text(text) => Some(text),
            UpstreamValue::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageRef> {
        match self {
            UpstreamValue::Image(image) => Some(image),
            UpstreamValue::Text(_) => None,
        }
    }

    pub fn texts(values: &[UpstreamValue]) -> Vec<&str> {
        values.iter().filter_map(UpstreamValue::as_text).collect()
    }

    pub fn images(values: &[UpstreamValue]) -> Vec<ImageRef> {
        values
            .iter()
            .filter_map(UpstreamValue::as_image)
            .cloned()
            .collect()
    }

    pub fn first_text(values: &[UpstreamValue]) -> Option<&str> {
        values.iter().find_map(UpstreamValue::as_text)
    }

    pub fn first_image(values: &[UpstreamValue]) -> Option<&ImageRef> {
        values.iter().find_map(UpstreamValue::as_image)
    }
}

/// Read access needed during resolution: full-size assets live in the tab's
/// cache, not in node values.
pub struct UpstreamSources<'a> {
    pub store: &'a TabStore,
    pub tab_id: &'a str,
}

impl UpstreamSources<'_> {
    fn cached_image(&self, node_id: &str, channel: CacheChannel) -> Option<ImageRef> {
        let url = self
            .store
            .full_size_image(self.tab_id, node_id, channel.to_offset())?;
        images::image_ref_from_data_url(&url).ok()
    }
}

/// Resolve every inbound value for `node_id`, all handles, in connection
/// order.
pub fn resolve_upstream(
    node_id: &str,
    working: &WorkingSet,
    sources: &UpstreamSources<'_>,
) -> Result<Vec<UpstreamValue>, EngineError> {
    resolve_filtered(node_id, working, sources, None)
}

/// Resolve inbound values for a specific handle (`None` = the primary
/// handle).
pub fn resolve_upstream_for_handle(
    node_id: &str,
    working: &WorkingSet,
    sources: &UpstreamSources<'_>,
    handle: Option<&str>,
) -> Result<Vec<UpstreamValue>, EngineError> {
    resolve_filtered(node_id, working, sources, Some(handle))
}

fn resolve_filtered(
    node_id: &str,
    working: &WorkingSet,
    sources: &UpstreamSources<'_>,
    handle_filter: Option<Option<&str>>,
) -> Result<Vec<UpstreamValue>, EngineError> {
    let mut values = Vec::new();
    for connection in working.inbound(node_id) {
        if let Some(wanted) = handle_filter {
            if connection.to_handle_id.as_deref() != wanted {
                continue;
            }
        }
        let Some(source) = working.node(&connection.from_node_id) else {
            continue;
        };
        // Each connection contributes its own entry; the visited set only
        // guards the reroute descent within one connection against cycles.
        let mut visited = HashSet::new();
        append_outputs(source, working, sources, &mut visited, &mut values)?;
    }
    Ok(values)
}

fn append_outputs(
    node: &Node,
    working: &WorkingSet,
    sources: &UpstreamSources<'_>,
    visited: &mut HashSet<String>,
    out: &mut Vec<UpstreamValue>,
) -> Result<(), EngineError> {
    // Reroute chains may be cyclic in a malformed graph; a revisit is
    // silently treated as already satisfied.
    if !visited.insert(node.id.clone()) {
        return Ok(());
    }

    match node.kind {
        NodeKind::Prompt | NodeKind::DataReader => {
            let payload: TextPayload = parse_payload(&node.value)?;
            if !payload.text.is_empty() {
                out.push(UpstreamValue::Text(payload.text));
            }
        }
        NodeKind::ImageInput => {
            let payload: ImageInputPayload = parse_payload(&node.value)?;
            if let Some(image) = payload.image {
                out.push(UpstreamValue::Image(image));
            }
        }
        NodeKind::Note => {}
        NodeKind::Reroute => {
            for connection in working.inbound(&node.id) {
                if let Some(source) = working.node(&connection.from_node_id) {
                    append_outputs(source, working, sources, visited, out)?;
                }
            }
        }
        NodeKind::EnhancePrompt
        | NodeKind::SanitizePrompt
        | NodeKind::TranslatePrompt
        | NodeKind::DescribeImage => {
            let payload: TextPayload = parse_payload(&node.value)?;
            if !payload.text.is_empty() {
                out.push(UpstreamValue::Text(payload.text));
            }
        }
        NodeKind::AnalyzePrompt | NodeKind::CharacterAnalyzer => {
            let payload: AnalysisPayload = parse_payload(&node.value)?;
            if let Some(analysis) = payload.analysis {
                out.push(UpstreamValue::Text(analysis.to_string()));
            }
        }
        NodeKind::ScriptGenerator => {
            let payload: ScriptPayload = parse_payload(&node.value)?;
            if !payload.scenes.is_empty() {
                out.push(UpstreamValue::Text(
                    serde_json::Value::Array(payload.scenes).to_string(),
                ));
            }
        }
        NodeKind::CharacterGenerator => {
            let payload: CharacterPayload = parse_payload(&node.value)?;
            if !payload.characters.is_empty() {
                out.push(UpstreamValue::Text(
                    serde_json::Value::Array(payload.characters).to_string(),
                ));
            }
        }
        NodeKind::ImageOutput => {
            let payload: crate::models::payloads::ImageOutputPayload =
                parse_payload(&node.value)?;
            if let Some(image) = sources
                .cached_image(&node.id, CacheChannel::Primary)
                .or_else(|| thumbnail_ref(payload.thumbnail.as_deref()))
            {
                out.push(UpstreamValue::Image(image));
            }
        }
        NodeKind::ImageEditor | NodeKind::SequenceGenerator => {
            let payload: SequencePayload = parse_payload(&node.value)?;
            if let Some(image) = sources
                .cached_image(&node.id, CacheChannel::Primary)
                .or_else(|| thumbnail_ref(payload.thumbnail.as_deref()))
            {
                out.push(UpstreamValue::Image(image));
            }
            for (index, slot) in payload.sequence_outputs.iter().enumerate() {
                if slot.status != FrameStatus::Done {
                    continue;
                }
                let channel = CacheChannel::SequenceOutput(index as u32);
                if let Some(image) = sources
                    .cached_image(&node.id, channel)
                    .or_else(|| thumbnail_ref(slot.thumbnail.as_deref()))
                {
                    out.push(UpstreamValue::Image(image));
                }
            }
        }
        // Video frames are not consumable as reference images.
        NodeKind::VideoOutput => {}
    }
    Ok(())
}

fn thumbnail_ref(thumbnail: Option<&str>) -> Option<ImageRef> {
    images::image_ref_from_data_url(thumbnail?).ok()
}
