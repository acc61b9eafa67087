// Text transforms: pure text in, text out.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::models::payloads::{parse_payload, serialize_payload, TextPayload};
use crate::retry::{call_with_retry, TEXT_BASE_DELAY, TEXT_RETRIES};
use crate::services::TextOp;

use super::{resolve_text_input, Processor, ProcessorContext, ProcessorOutput};

pub struct TextTransform {
    op: TextOp,
}

pub static ENHANCE: TextTransform = TextTransform {
    op: TextOp::Enhance,
};
pub static SANITIZE: TextTransform = TextTransform {
    op: TextOp::Sanitize,
};
pub static TRANSLATE: TextTransform = TextTransform {
    op: TextOp::Translate,
};

#[async_trait]
impl Processor for TextTransform {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError> {
        let payload: TextPayload = parse_payload(&ctx.node.value)?;
        let input = resolve_text_input(ctx.upstream, &payload.input);
        if input.trim().is_empty() {
            return Err(EngineError::Validation("No prompt provided".into()));
        }

        let text = call_with_retry(
            || ctx.service.transform_text(self.op, &input),
            TEXT_RETRIES,
            TEXT_BASE_DELAY,
        )
        .await?;

        let mut merged = payload;
        merged.text = text;
        Ok(ProcessorOutput::value(serialize_payload(&merged)?))
    }
}
