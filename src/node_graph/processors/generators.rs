// Generators: text in, structured arrays out. Results are appended to the
// arrays already stored on the node, never replacing earlier runs.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineError;
use crate::models::payloads::{parse_payload, serialize_payload, CharacterPayload, ScriptPayload};
use crate::retry::{call_with_retry, TEXT_BASE_DELAY, TEXT_RETRIES};

use super::{resolve_text_input, Processor, ProcessorContext, ProcessorOutput};

const DEFAULT_SCENE_COUNT: u32 = 5;

pub struct ScriptGenerator;
pub struct CharacterGenerator;

pub static SCRIPT: ScriptGenerator = ScriptGenerator;
pub static CHARACTERS: CharacterGenerator = CharacterGenerator;

/// Pull the named array out of a service response that is either a bare
/// array or an object wrapping one.
fn extract_array(response: Value, key: &str) -> Result<Vec<Value>, EngineError> {
    match response {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(EngineError::Parse(format!(
                "Generation response is missing the '{}' array",
                key
            ))),
        },
        _ => Err(EngineError::Parse(
            "Generation response is not structured data".into(),
        )),
    }
}

#[async_trait]
impl Processor for ScriptGenerator {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError> {
        let payload: ScriptPayload = parse_payload(&ctx.node.value)?;
        let premise = resolve_text_input(ctx.upstream, &payload.premise);
        if premise.trim().is_empty() {
            return Err(EngineError::Validation("No premise provided".into()));
        }
        let scene_count = if payload.scene_count == 0 {
            DEFAULT_SCENE_COUNT
        } else {
            payload.scene_count
        };

        let response = call_with_retry(
            || ctx.service.generate_script(&premise, scene_count),
            TEXT_RETRIES,
            TEXT_BASE_DELAY,
        )
        .await?;

        let mut merged = payload;
        merged.scenes.extend(extract_array(response, "scenes")?);
        Ok(ProcessorOutput::value(serialize_payload(&merged)?))
    }
}

#[async_trait]
impl Processor for CharacterGenerator {
    async fn process(&self, ctx: &ProcessorContext<'_>) -> Result<ProcessorOutput, EngineError> {
        let payload: CharacterPayload = parse_payload(&ctx.node.value)?;
        let brief = resolve_text_input(ctx.upstream, &payload.brief);
        if brief.trim().is_empty() {
            return Err(EngineError::Validation("No character brief provided".into()));
        }

        let response = call_with_retry(
            || ctx.service.generate_characters(&brief),
            TEXT_RETRIES,
            TEXT_BASE_DELAY,
        )
        .await?;

        let mut merged = payload;
        merged
            .characters
            .extend(extract_array(response, "characters")?);
        Ok(ProcessorOutput::value(serialize_payload(&merged)?))
    }
}
