// Image and video producers.
//
// Image producers dual-write: the thumbnail goes into the returned value,
// the full-resolution asset into the frame cache at the primary offset.

use async_trait::async_trait;

use crate::cache::CacheChannel;
use crate::error::EngineError;
use crate::images;
use crate::models::payloads::{
    parse_payload, serialize_payload, ImageOutputPayload, OutpaintingSettings, SequencePayload,
    VideoOutputPayload,
};
use crate::models::schema::{DownloadData, DownloadKind, ImageRef};
use crate::node_graph::upstream::UpstreamValue;
use crate::retry::{
    call_with_retry, IMAGE_BASE_DELAY, IMAGE_RETRIES, VIDEO_BASE_DELAY, VIDEO_RETRIES,
};

use super::{resolve_text_input, Processor, ProcessorContext, ProcessorOutput};

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// Placeholder token in user-configurable outpainting templates.
pub const OUTPAINT_PLACEHOLDER: &str = "{prompt}";

/// Background-fill instruction used when the user has not customized the
/// template.
pub const DEFAULT_OUTPAINT_TEMPLATE: &str = "Extend the image beyond its original borders, \
filling the new background naturally and seamlessly. Scene: {prompt}. \
Keep the original content unchanged.";

/// Substitute the resolved prompt into the outpainting template.
pub fn apply_outpainting(prompt: &str, settings: &OutpaintingSettings) -> String {
    if !settings.enabled {
        return prompt.to_string();
    }
    let template = if settings.template.trim().is_empty() {
        DEFAULT_OUTPAINT_TEMPLATE
    } else {
        settings.template.as_str()
    };
    template.replace(OUTPAINT_PLACEHOLDER, prompt)
}

pub fn effective_aspect_ratio(aspect_ratio: &str) -> &str {
    if aspect_ratio.trim().is_empty() {
        DEFAULT_ASPECT_RATIO
    } else {
        aspect_ratio
    }
}

/// Pad reference images to the target aspect ratio before generation.
fn reformat_references(
    references: Vec<ImageRef>,
    aspect_ratio: &str,
) -> Result<Vec<ImageRef>, EngineError> {
    references
        .into_iter()
        .map(|image| {
            let url = images::data_url_from_image_ref(&image);
            let reformatted = images::reformat_to_aspect(&url, aspect_ratio)?;
            images::image_ref_from_data_url(&reformatted)
        })
        .collect()
}

pub struct ImageOutput;
pub struct ImageEditor;
pub struct VideoOutput;

pub static IMAGE_OUTPUT: ImageOutput = ImageOutput;
pub static IMAGE_EDITOR: ImageEditor = ImageEditor;
pub static VIDEO_OUTPUT: VideoOutput = VideoOutput;

#[async_trait]
impl Processor for ImageOutput {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError> {
        let payload: ImageOutputPayload = parse_payload(&ctx.node.value)?;
        let prompt = resolve_text_input(ctx.upstream, &payload.prompt);
        if prompt.trim().is_empty() {
            return Err(EngineError::Validation("No prompt provided".into()));
        }

        let aspect_ratio = effective_aspect_ratio(&payload.aspect_ratio).to_string();
        let mut references = UpstreamValue::images(ctx.upstream);
        if payload.reformat_references && !references.is_empty() {
            references = reformat_references(references, &aspect_ratio)?;
        }
        let effective_prompt = apply_outpainting(&prompt, &payload.outpainting);

        let url = call_with_retry(
            || {
                ctx.service.generate_image(
                    &effective_prompt,
                    &aspect_ratio,
                    &references,
                    &payload.model,
                    payload.resolution.as_deref(),
                )
            },
            IMAGE_RETRIES,
            IMAGE_BASE_DELAY,
        )
        .await?;

        ctx.cache
            .save_full_size(CacheChannel::Primary.to_offset(), &url)?;

        let mut merged = payload;
        merged.thumbnail = Some(images::make_thumbnail(&url, images::THUMBNAIL_MAX_DIM)?);
        let auto_download = merged.auto_download;
        let mut output = ProcessorOutput::value(serialize_payload(&merged)?);
        if auto_download {
            output = output.with_download(DownloadData {
                url,
                prompt: effective_prompt,
                kind: DownloadKind::Image,
            });
        }
        Ok(output)
    }
}

/// Single-edit path for the image editor node: chain execution edits the
/// primary output once. Frame-by-frame generation goes through the sequence
/// engine instead.
#[async_trait]
impl Processor for ImageEditor {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError> {
        let payload: SequencePayload = parse_payload(&ctx.node.value)?;
        let prompt = resolve_text_input(ctx.upstream, &payload.prompt);
        if prompt.trim().is_empty() {
            return Err(EngineError::Validation("No prompt provided".into()));
        }
        let references = UpstreamValue::images(ctx.upstream);
        if references.is_empty() {
            return Err(EngineError::Validation("No image provided for editing".into()));
        }

        let aspect_ratio = effective_aspect_ratio(&payload.aspect_ratio).to_string();
        let effective_prompt = apply_outpainting(&prompt, &payload.outpainting);

        let url = call_with_retry(
            || {
                ctx.service.generate_image(
                    &effective_prompt,
                    &aspect_ratio,
                    &references,
                    &payload.model,
                    payload.resolution.as_deref(),
                )
            },
            IMAGE_RETRIES,
            IMAGE_BASE_DELAY,
        )
        .await?;

        ctx.cache
            .save_full_size(CacheChannel::Primary.to_offset(), &url)?;

        let mut merged = payload;
        merged.thumbnail = Some(images::make_thumbnail(&url, images::THUMBNAIL_MAX_DIM)?);
        let auto_download = merged.auto_download;
        let mut output = ProcessorOutput::value(serialize_payload(&merged)?);
        if auto_download {
            output = output.with_download(DownloadData {
                url,
                prompt: effective_prompt,
                kind: DownloadKind::Image,
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl Processor for VideoOutput {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError> {
        let payload: VideoOutputPayload = parse_payload(&ctx.node.value)?;
        let prompt = resolve_text_input(ctx.upstream, &payload.prompt);
        if prompt.trim().is_empty() {
            return Err(EngineError::Validation("No prompt provided".into()));
        }
        let aspect_ratio = effective_aspect_ratio(&payload.aspect_ratio).to_string();
        let resolution = if payload.resolution.is_empty() {
            "720p".to_string()
        } else {
            payload.resolution.clone()
        };

        // Video generation is long-running and externally polled; one retry
        // only.
        let url = call_with_retry(
            || ctx.service.generate_video(&prompt, &aspect_ratio, &resolution),
            VIDEO_RETRIES,
            VIDEO_BASE_DELAY,
        )
        .await?;

        let mut merged = payload;
        merged.video_url = Some(url.clone());
        let auto_download = merged.auto_download;
        let mut output = ProcessorOutput::value(serialize_payload(&merged)?);
        if auto_download {
            output = output.with_download(DownloadData {
                url,
                prompt,
                kind: DownloadKind::Video,
            });
        }
        Ok(output)
    }
}
