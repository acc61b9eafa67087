// Full-size image cache.
//
// Node values carry thumbnails only; full-resolution assets live here, keyed
// by `(node_id, offset)`. The integer offset multiplexes several logical
// lists into one key space and is the serialization contract for saved
// canvases; inside the crate the `CacheChannel` variant is the source of
// truth so offsets can never overlap.

use std::collections::HashMap;

pub const INPUT_A_MAX_SLOT: u32 = 999;
pub const SEQUENCE_BASE: u32 = 1000;
pub const INPUT_B_BASE: u32 = 2000;
pub const CHANNEL_SPAN: u32 = 1000;

/// Logical address of one cached asset within a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheChannel {
    /// The node's single primary output.
    Primary,
    /// Input-A slot, 1-based (offset 0 is reserved for `Primary`).
    InputA(u32),
    /// Sequence output frame, 0-based.
    SequenceOutput(u32),
    /// Input-B slot, 0-based.
    InputB(u32),
}

impl CacheChannel {
    /// Numeric offset used in the saved-canvas format.
    pub fn to_offset(self) -> u32 {
        match self {
            CacheChannel::Primary => 0,
            CacheChannel::InputA(slot) => {
                debug_assert!((1..=INPUT_A_MAX_SLOT).contains(&slot));
                slot
            }
            CacheChannel::SequenceOutput(frame) => {
                debug_assert!(frame < CHANNEL_SPAN);
                SEQUENCE_BASE + frame
            }
            CacheChannel::InputB(slot) => {
                debug_assert!(slot < CHANNEL_SPAN);
                INPUT_B_BASE + slot
            }
        }
    }

    pub fn from_offset(offset: u32) -> Self {
        match offset {
            0 => CacheChannel::Primary,
            1..=INPUT_A_MAX_SLOT => CacheChannel::InputA(offset),
            SEQUENCE_BASE..=1999 => CacheChannel::SequenceOutput(offset - SEQUENCE_BASE),
            _ => CacheChannel::InputB(offset - INPUT_B_BASE),
        }
    }
}

/// Per-tab addressable store for full-resolution assets.
#[derive(Default)]
pub struct FrameCache {
    entries: HashMap<(String, u32), String>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_full_size_image(&mut self, node_id: &str, offset: u32, data_url: String) {
        self.entries.insert((node_id.to_string(), offset), data_url);
    }

    pub fn get_full_size_image(&self, node_id: &str, offset: u32) -> Option<&str> {
        self.entries
            .get(&(node_id.to_string(), offset))
            .map(String::as_str)
    }

    pub fn set(&mut self, node_id: &str, channel: CacheChannel, data_url: String) {
        self.set_full_size_image(node_id, channel.to_offset(), data_url);
    }

    pub fn get(&self, node_id: &str, channel: CacheChannel) -> Option<&str> {
        self.get_full_size_image(node_id, channel.to_offset())
    }

    /// Drop every asset for one node (node deletion).
    pub fn clear_node(&mut self, node_id: &str) {
        self.entries.retain(|(id, _), _| id != node_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
