// Frame-by-frame generation for sequence-capable nodes.
//
// Each frame slot moves through `idle -> pending -> generating -> done|error`,
// with `generating -> idle` on cancellation so a cancelled frame can be
// resumed later. The run never leaves a slot looking in-flight after the loop
// exits.

use std::collections::HashMap;

use chrono::Local;
use serde_json::Value;

use crate::abort::{race_abort, AbortHandle};
use crate::cache::CacheChannel;
use crate::download::{editor_frame_filename, sequence_frame_filename};
use crate::error::EngineError;
use crate::images;
use crate::models::payloads::{
    parse_payload, serialize_payload, FrameStatus, SequenceMode, SequencePayload,
};
use crate::models::schema::{ActiveOperation, DownloadData, DownloadKind, ImageRef, NodeKind};
use crate::node_graph::executor::{operation_description, Engine};
use crate::node_graph::processors::image::{apply_outpainting, effective_aspect_ratio};
use crate::node_graph::state::WorkingSet;
use crate::node_graph::upstream::{
    resolve_upstream_for_handle, UpstreamSources, UpstreamValue, REFERENCE_HANDLE,
};
use crate::retry::{call_with_retry, IMAGE_BASE_DELAY, IMAGE_RETRIES};

/// Upstream text split into structured per-frame prompts and generic prose.
///
/// Structured data is JSON carrying `frameNumber` (1-based) and `prompt`
/// entries, either as a bare array or wrapped in a `frames` object. Anything
/// that does not parse as such is kept as generic text.
#[derive(Debug, Default)]
pub struct FramePrompts {
    structured: HashMap<usize, String>,
    generic: Vec<String>,
}

impl FramePrompts {
    pub fn parse<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut prompts = Self::default();
        for text in texts {
            let text = text.as_ref();
            if !prompts.absorb_structured(text) {
                prompts.generic.push(text.to_string());
            }
        }
        prompts
    }

    fn absorb_structured(&mut self, text: &str) -> bool {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return false;
        };
        let frames = match &value {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => match map.get("frames") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => return false,
            },
            _ => return false,
        };
        let mut found = false;
        for frame in frames {
            let Some(number) = frame.get("frameNumber").and_then(Value::as_u64) else {
                continue;
            };
            let Some(prompt) = frame.get("prompt").and_then(Value::as_str) else {
                continue;
            };
            if number == 0 {
                continue;
            }
            // Later sources override earlier ones for the same frame.
            self.structured.insert((number - 1) as usize, prompt.to_string());
            found = true;
        }
        found
    }

    pub fn structured_for(&self, frame: usize) -> Option<&str> {
        self.structured.get(&frame).map(String::as_str)
    }

    pub fn generic(&self) -> &[String] {
        &self.generic
    }

    pub fn structured_frame_count(&self) -> usize {
        self.structured.keys().max().map_or(0, |max| max + 1)
    }
}

/// Prompt precedence: structured upstream entry, then the locally edited
/// per-frame prompt, then the global per-node prompt. Generic upstream text
/// is concatenated only when the payload asks for it.
pub fn resolve_frame_prompt(
    frame: usize,
    prompts: &FramePrompts,
    payload: &SequencePayload,
) -> String {
    let base = prompts
        .structured_for(frame)
        .map(str::to_string)
        .or_else(|| {
            payload
                .frame_prompts
                .get(frame)
                .filter(|p| !p.trim().is_empty())
                .cloned()
        })
        .unwrap_or_else(|| payload.prompt.clone());

    if payload.append_upstream_text && !prompts.generic.is_empty() {
        let extra = prompts.generic.join(", ");
        if base.trim().is_empty() {
            extra
        } else {
            format!("{}, {}", base, extra)
        }
    } else {
        base
    }
}

/// Reference images for one frame, per mode.
pub fn resolve_frame_images(
    mode: SequenceMode,
    frame: usize,
    primary: &[ImageRef],
    secondary: &[ImageRef],
) -> Vec<ImageRef> {
    match mode {
        SequenceMode::Off | SequenceMode::PromptPerFrame => {
            primary.get(frame).cloned().into_iter().collect()
        }
        SequenceMode::EditingWithSharedPrompts => secondary.to_vec(),
        SequenceMode::Combination => {
            let mut refs: Vec<ImageRef> = primary.get(frame).cloned().into_iter().collect();
            refs.extend(secondary.iter().cloned());
            refs
        }
    }
}

/// Total frame count is derived on read, never stored: the widest of the
/// structured prompt range, the local per-frame prompt list, and the
/// positional input image list.
pub fn derived_frame_total(
    payload: &SequencePayload,
    prompts: &FramePrompts,
    primary_images: &[ImageRef],
) -> usize {
    prompts
        .structured_frame_count()
        .max(payload.frame_prompts.len())
        .max(primary_images.len())
}

impl Engine {
    /// Run every frame from 0 through the derived total.
    pub async fn run_all_frames(
        &self,
        tab_id: &str,
        node_id: &str,
        abort: &AbortHandle,
    ) -> Result<(), EngineError> {
        self.run_frames(tab_id, node_id, None, abort).await
    }

    /// Run an explicit frame list (sorted ascending, duplicates dropped).
    pub async fn run_selected_frames(
        &self,
        tab_id: &str,
        node_id: &str,
        frames: Vec<usize>,
        abort: &AbortHandle,
    ) -> Result<(), EngineError> {
        self.run_frames(tab_id, node_id, Some(frames), abort).await
    }

    /// Re-run a single frame.
    pub async fn regenerate_frame(
        &self,
        tab_id: &str,
        node_id: &str,
        frame: usize,
        abort: &AbortHandle,
    ) -> Result<(), EngineError> {
        self.run_frames(tab_id, node_id, Some(vec![frame]), abort)
            .await
    }

    async fn run_frames(
        &self,
        tab_id: &str,
        node_id: &str,
        frames: Option<Vec<usize>>,
        abort: &AbortHandle,
    ) -> Result<(), EngineError> {
        let graph = self
            .store
            .graph_snapshot(tab_id)
            .ok_or_else(|| EngineError::Validation(format!("Unknown tab '{}'", tab_id)))?;
        let working = WorkingSet::from_graph(graph);
        let node = working
            .node(node_id)
            .ok_or_else(|| EngineError::Validation(format!("Node '{}' not found", node_id)))?;
        let kind = node.kind;
        if !kind.is_sequence_capable() {
            return Err(EngineError::Validation(format!(
                "Node '{}' does not support frame sequences",
                node_id
            )));
        }
        let payload: SequencePayload = parse_payload(&node.value)?;

        let sources = UpstreamSources {
            store: &self.store,
            tab_id,
        };
        let primary_upstream = resolve_upstream_for_handle(node_id, &working, &sources, None)?;
        let secondary_upstream =
            resolve_upstream_for_handle(node_id, &working, &sources, Some(REFERENCE_HANDLE))?;

        let prompts = FramePrompts::parse(&UpstreamValue::texts(&primary_upstream));
        let primary_images = UpstreamValue::images(&primary_upstream);
        let secondary_images = UpstreamValue::images(&secondary_upstream);

        // Input images are mirrored into the cache so saved canvases can
        // restore them at full resolution.
        for (index, image) in primary_images.iter().enumerate() {
            let offset = CacheChannel::InputA(index as u32 + 1).to_offset();
            self.store.write_cache(
                tab_id,
                node_id,
                offset,
                images::data_url_from_image_ref(image),
            )?;
        }
        for (index, image) in secondary_images.iter().enumerate() {
            let offset = CacheChannel::InputB(index as u32).to_offset();
            self.store.write_cache(
                tab_id,
                node_id,
                offset,
                images::data_url_from_image_ref(image),
            )?;
        }

        let targets = match frames {
            Some(mut list) => {
                list.sort_unstable();
                list.dedup();
                list
            }
            None => (0..derived_frame_total(&payload, &prompts, &primary_images)).collect(),
        };
        if targets.is_empty() {
            return Err(EngineError::Validation("No frames to generate".into()));
        }

        let tab_name = self.store.tab_name(tab_id).unwrap_or_default();
        self.ops.register(ActiveOperation {
            id: node_id.to_string(),
            kind,
            description: operation_description(kind).to_string(),
            tab_id: tab_id.to_string(),
            tab_name,
        });

        // One batch write stamps the whole queued set before any call starts.
        let stamped = {
            let targets = targets.clone();
            self.store.update_node(
                tab_id,
                node_id,
                move |value| {
                    let mut payload: SequencePayload = parse_payload(value)?;
                    for &frame in &targets {
                        payload.ensure_slot(frame).status = FrameStatus::Pending;
                    }
                    serialize_payload(&payload)
                },
                None,
            )
        };

        // A failed batch write takes the same exit as a failed frame: the
        // cleanup sweep and the marker removal below must run regardless.
        let result = match stamped {
            Ok(()) => {
                self.frame_loop(
                    tab_id,
                    node_id,
                    kind,
                    &targets,
                    &prompts,
                    &primary_images,
                    &secondary_images,
                    abort,
                )
                .await
            }
            Err(err) => Err(err),
        };

        // Any slot still pending or generating is forced back to idle so no
        // slot looks in-flight after the run.
        let cleanup = self.store.update_node(
            tab_id,
            node_id,
            |value| {
                let mut payload: SequencePayload = parse_payload(value)?;
                for slot in &mut payload.sequence_outputs {
                    if matches!(slot.status, FrameStatus::Pending | FrameStatus::Generating) {
                        slot.status = FrameStatus::Idle;
                    }
                }
                serialize_payload(&payload)
            },
            None,
        );
        if let Err(err) = cleanup {
            log::warn!("sequence cleanup for '{}' failed: {}", node_id, err);
        }
        self.ops.unregister(node_id);

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn frame_loop(
        &self,
        tab_id: &str,
        node_id: &str,
        kind: NodeKind,
        targets: &[usize],
        prompts: &FramePrompts,
        primary_images: &[ImageRef],
        secondary_images: &[ImageRef],
        abort: &AbortHandle,
    ) -> Result<(), EngineError> {
        for &frame in targets {
            if abort.is_aborted() {
                log::info!("sequence run for '{}' aborted before frame {}", node_id, frame);
                break;
            }

            // Re-parse the latest stored value each iteration; per-frame
            // prompts may differ and earlier iterations have written slots.
            let value = self
                .store
                .node_value(tab_id, node_id)
                .ok_or_else(|| EngineError::Validation(format!("Node '{}' not found", node_id)))?;
            let payload: SequencePayload = parse_payload(&value)?;

            let prompt = resolve_frame_prompt(frame, prompts, &payload);
            if prompt.trim().is_empty() {
                self.set_frame_status(tab_id, node_id, frame, FrameStatus::Error, None, None)?;
                return Err(EngineError::Validation(format!(
                    "No prompt provided for frame {}",
                    frame + 1
                )));
            }

            let references =
                resolve_frame_images(payload.mode, frame, primary_images, secondary_images);
            if kind == NodeKind::ImageEditor && references.is_empty() {
                self.set_frame_status(tab_id, node_id, frame, FrameStatus::Error, None, None)?;
                return Err(EngineError::Validation("No image provided for editing".into()));
            }

            let aspect_ratio = effective_aspect_ratio(&payload.aspect_ratio).to_string();
            let effective_prompt = apply_outpainting(&prompt, &payload.outpainting);

            self.set_frame_status(tab_id, node_id, frame, FrameStatus::Generating, None, None)?;

            let generated = race_abort(
                abort,
                call_with_retry(
                    || {
                        self.service.generate_image(
                            &effective_prompt,
                            &aspect_ratio,
                            &references,
                            &payload.model,
                            payload.resolution.as_deref(),
                        )
                    },
                    IMAGE_RETRIES,
                    IMAGE_BASE_DELAY,
                ),
            )
            .await;

            match generated {
                Ok(url) => {
                    let thumbnail = match images::make_thumbnail(&url, images::THUMBNAIL_MAX_DIM) {
                        Ok(thumbnail) => thumbnail,
                        Err(err) => {
                            self.set_frame_status(
                                tab_id,
                                node_id,
                                frame,
                                FrameStatus::Error,
                                None,
                                None,
                            )?;
                            return Err(err);
                        }
                    };
                    let offset = CacheChannel::SequenceOutput(frame as u32).to_offset();
                    self.set_frame_status(
                        tab_id,
                        node_id,
                        frame,
                        FrameStatus::Done,
                        Some(thumbnail),
                        Some((offset, url.clone())),
                    )?;
                    if payload.auto_download {
                        let filename = match kind {
                            NodeKind::ImageEditor => editor_frame_filename(frame, Local::now()),
                            _ => sequence_frame_filename(frame, Local::now()),
                        };
                        self.downloads.download(
                            &DownloadData {
                                url,
                                prompt: effective_prompt,
                                kind: DownloadKind::Image,
                            },
                            &filename,
                        );
                    }
                }
                Err(err) if err.is_abort() => {
                    // Quiet reversion: the frame is resumable, the run is not
                    // an error.
                    self.set_frame_status(tab_id, node_id, frame, FrameStatus::Idle, None, None)?;
                    log::info!("sequence run for '{}' aborted at frame {}", node_id, frame);
                    break;
                }
                Err(err) => {
                    self.set_frame_status(tab_id, node_id, frame, FrameStatus::Error, None, None)?;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn set_frame_status(
        &self,
        tab_id: &str,
        node_id: &str,
        frame: usize,
        status: FrameStatus,
        thumbnail: Option<String>,
        cache_update: Option<(u32, String)>,
    ) -> Result<(), EngineError> {
        self.store.update_node(
            tab_id,
            node_id,
            move |value| {
                let mut payload: SequencePayload = parse_payload(value)?;
                let slot = payload.ensure_slot(frame);
                slot.status = status;
                if thumbnail.is_some() {
                    slot.thumbnail = thumbnail;
                }
                serialize_payload(&payload)
            },
            cache_update,
        )
    }
}
