// Analyzers: text or image in, prose or structured JSON out.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::models::payloads::{parse_payload, serialize_payload, AnalysisPayload, TextPayload};
use crate::node_graph::upstream::UpstreamValue;
use crate::retry::{call_with_retry, TEXT_BASE_DELAY, TEXT_RETRIES};

use super::{resolve_text_input, Processor, ProcessorContext, ProcessorOutput};

pub struct DescribeImage;
pub struct AnalyzePrompt;
pub struct CharacterAnalyzer;

pub static DESCRIBE_IMAGE: DescribeImage = DescribeImage;
pub static ANALYZE_PROMPT: AnalyzePrompt = AnalyzePrompt;
pub static CHARACTER_ANALYZER: CharacterAnalyzer = CharacterAnalyzer;

#[async_trait]
impl Processor for DescribeImage {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError> {
        let payload: TextPayload = parse_payload(&ctx.node.value)?;
        let image = UpstreamValue::first_image(ctx.upstream)
            .ok_or_else(|| EngineError::Validation("No image provided to describe".into()))?;

        let text = call_with_retry(
            || ctx.service.describe_image(image),
            TEXT_RETRIES,
            TEXT_BASE_DELAY,
        )
        .await?;

        let mut merged = payload;
        merged.text = text;
        Ok(ProcessorOutput::value(serialize_payload(&merged)?))
    }
}

#[async_trait]
impl Processor for AnalyzePrompt {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError> {
        let payload: AnalysisPayload = parse_payload(&ctx.node.value)?;
        let input = resolve_text_input(ctx.upstream, &payload.input);
        if input.trim().is_empty() {
            return Err(EngineError::Validation("No prompt provided".into()));
        }

        let analysis = call_with_retry(
            || ctx.service.analyze_prompt(&input),
            TEXT_RETRIES,
            TEXT_BASE_DELAY,
        )
        .await?;

        let mut merged = payload;
        merged.analysis = Some(analysis);
        Ok(ProcessorOutput::value(serialize_payload(&merged)?))
    }
}

#[async_trait]
impl Processor for CharacterAnalyzer {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError> {
        let payload: AnalysisPayload = parse_payload(&ctx.node.value)?;
        let input = resolve_text_input(ctx.upstream, &payload.input);
        let images = UpstreamValue::images(ctx.upstream);
        if input.trim().is_empty() && images.is_empty() {
            return Err(EngineError::Validation(
                "No character description or image provided".into(),
            ));
        }

        let analysis = call_with_retry(
            || ctx.service.analyze_character(&input, &images),
            TEXT_RETRIES,
            TEXT_BASE_DELAY,
        )
        .await?;

        let mut merged = payload;
        merged.analysis = Some(analysis);
        Ok(ProcessorOutput::value(serialize_payload(&merged)?))
    }
}
