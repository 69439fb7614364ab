//! Structured generation with a free-text fallback.
//!
//! A request first asks the backend for a schema-shaped object. If the
//! backend reports that no object could be generated, the request is sent
//! again as plain text with the expected JSON shape spelled out in the
//! prompt, and the first JSON object in the reply is projected onto the
//! schema's fields. Every other failure is returned to the caller.

use schemars::{JsonSchema, generate::SchemaSettings};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument};

use crate::error::{GenerationStage, PlayerError, PlayerErrorKind};
use crate::game::{
    SeerNightAction, SpeechResponse, VotingResponse, WerewolfNightAction, WitchNightAction,
};
use crate::llm_client::{GenerationRequest, LlmBackend, LlmError, ObjectSchema};

/// A response type the pipeline can ask for by schema.
///
/// Response types decode leniently, so the fields a structured reply must
/// carry are listed in `REQUIRED` and checked before decoding.
pub trait ResponseSchema: DeserializeOwned + JsonSchema {
    /// Schema name sent to the backend.
    const NAME: &'static str;

    /// Wire names of the fields a structured reply must carry.
    const REQUIRED: &'static [&'static str];

    /// The named JSON schema for this type, with sub-schemas inlined.
    fn object_schema() -> ObjectSchema {
        let mut schema = SchemaSettings::default()
            .with(|s| s.inline_subschemas = true)
            .into_generator()
            .into_root_schema_for::<Self>()
            .to_value();
        if let Some(object) = schema.as_object_mut() {
            object.insert("required".to_string(), Value::from(Self::REQUIRED.to_vec()));
        }
        ObjectSchema::new(Self::NAME.to_string(), schema)
    }
}

impl ResponseSchema for SpeechResponse {
    const NAME: &'static str = "speech_response";
    const REQUIRED: &'static [&'static str] = &["speech"];
}

impl ResponseSchema for VotingResponse {
    const NAME: &'static str = "voting_response";
    const REQUIRED: &'static [&'static str] = &["target", "reason"];
}

impl ResponseSchema for WerewolfNightAction {
    const NAME: &'static str = "werewolf_night_action";
    const REQUIRED: &'static [&'static str] = &["action", "target", "reason"];
}

impl ResponseSchema for SeerNightAction {
    const NAME: &'static str = "seer_night_action";
    const REQUIRED: &'static [&'static str] = &["action", "target", "reason"];
}

impl ResponseSchema for WitchNightAction {
    const NAME: &'static str = "witch_night_action";
    const REQUIRED: &'static [&'static str] = &["action", "healTarget", "poisonTarget"];
}

/// Per-call overrides for the configured sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GenerationOptions {
    /// Overrides `ai.max_tokens`.
    pub max_tokens: Option<u32>,
    /// Overrides `ai.temperature`.
    pub temperature: Option<f32>,
}

/// Runs the structured-then-fallback pipeline for `T`.
#[instrument(skip(backend, request), fields(schema = T::NAME))]
pub async fn generate_structured<T: ResponseSchema>(
    backend: &dyn LlmBackend,
    function_id: &str,
    request: &GenerationRequest,
) -> Result<T, PlayerError> {
    let schema = T::object_schema();
    debug!(prompt = %request.prompt(), "Structured generation prompt");
    debug!(schema = %schema.describe(), "Structured generation schema");

    let structured = match backend.generate_object(request, &schema).await {
        Ok(value) => decode::<T>(value, &schema),
        Err(e) => Err(e),
    };

    match structured {
        Ok(object) => {
            info!("Structured generation succeeded");
            Ok(object)
        }
        Err(e) if e.is_no_object() => {
            info!(
                reason = %e.message,
                "Structured generation produced no object, falling back to text"
            );
            generate_with_fallback(backend, function_id, request, &schema).await
        }
        Err(e) => {
            error!(error = %e, "Structured generation failed");
            Err(generation_error(function_id, GenerationStage::Structured, &e))
        }
    }
}

#[instrument(skip(backend, request, schema))]
async fn generate_with_fallback<T: ResponseSchema>(
    backend: &dyn LlmBackend,
    function_id: &str,
    request: &GenerationRequest,
    schema: &ObjectSchema,
) -> Result<T, PlayerError> {
    let fail = |e: LlmError| {
        error!(error = %e, "Fallback generation failed");
        generation_error(function_id, GenerationStage::Fallback, &e)
    };

    let enhanced_prompt = format!(
        "{}\n\nIMPORTANT: You must respond with a valid JSON object that matches this exact schema:\n{}\n\nDo not include any text before or after the JSON. Only output the JSON object.",
        request.prompt(),
        schema.describe()
    );

    let text = backend
        .generate_text(&request.with_prompt(enhanced_prompt))
        .await
        .map_err(fail)?;
    debug!(raw_response = %text, "Fallback raw response");

    let json = extract_json_object(&text)
        .ok_or_else(|| fail(LlmError::backend("No JSON object found in response".to_string())))?;

    let parsed: Value = serde_json::from_str(json)
        .map_err(|e| fail(LlmError::backend(format!("Failed to parse JSON: {}", e))))?;

    let cleaned = Value::Object(clean_parsed_object(&parsed, &schema.field_names()));
    debug!(parsed = %cleaned, "Fallback parsed result");

    serde_json::from_value(cleaned).map_err(|e| {
        fail(LlmError::backend(format!(
            "Parsed object does not fit {}: {}",
            schema.name(),
            e
        )))
    })
}

/// Decodes a structured reply, treating a missing required field as no object.
fn decode<T: DeserializeOwned>(value: Value, schema: &ObjectSchema) -> Result<T, LlmError> {
    let missing = schema.missing_fields(&value);
    if !missing.is_empty() {
        return Err(LlmError::no_object(format!(
            "No object generated: response to {} is missing {}",
            schema.name(),
            missing.join(", ")
        )));
    }

    serde_json::from_value(value).map_err(|e| {
        LlmError::no_object(format!(
            "No object generated: response did not match schema {}: {}",
            schema.name(),
            e
        ))
    })
}

#[track_caller]
fn generation_error(function_id: &str, stage: GenerationStage, e: &LlmError) -> PlayerError {
    PlayerError::new(PlayerErrorKind::Generation {
        function_id: function_id.to_string(),
        stage,
        message: e.message.clone(),
    })
}

/// Returns the first complete top-level JSON object in `text`.
///
/// Braces inside JSON strings are ignored, so prose around the object and
/// braces in string values do not confuse the scan.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if start.is_some() => in_string = true,
            '{' => {
                if start.is_none() {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| &text[s..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Keeps only the declared `fields` of `parsed`, dropping `null` values.
///
/// Values are passed through as-is; a non-object input yields an empty map.
pub fn clean_parsed_object(parsed: &Value, fields: &[String]) -> Map<String, Value> {
    let Some(object) = parsed.as_object() else {
        return Map::new();
    };

    fields
        .iter()
        .filter_map(|key| match object.get(key) {
            Some(Value::Null) | None => None,
            Some(value) => Some((key.clone(), value.clone())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_skips_surrounding_prose() {
        let text = r#"Sure! Here is my vote: {"target": 2, "reason": "x", "extra": "y"} Hope that helps."#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"target": 2, "reason": "x", "extra": "y"}"#)
        );
    }

    #[test]
    fn test_extract_handles_nesting_and_braces_in_strings() {
        let text = r#"```json
{"speech": "I saw {nothing} odd", "meta": {"a": {"b": 1}}}
```"#;
        let json = extract_json_object(text).expect("Object expected");
        let value: Value = serde_json::from_str(json).expect("Valid JSON expected");
        assert_eq!(value["meta"]["a"]["b"], 1);
    }

    #[test]
    fn test_extract_stops_at_first_object() {
        let text = r#"{"target": 1, "reason": "a"} and later {"target": 9}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"target": 1, "reason": "a"}"#));
    }

    #[test]
    fn test_extract_without_object() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{ unterminated"), None);
    }

    #[test]
    fn test_clean_drops_unknown_and_null_fields() {
        let parsed = serde_json::json!({"target": 2, "reason": null, "extra": "y"});
        let cleaned = clean_parsed_object(&parsed, &fields(&["target", "reason"]));
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned["target"], 2);
    }

    #[test]
    fn test_clean_passes_values_through_untyped() {
        let parsed = serde_json::json!({"target": "two", "reason": ["a"]});
        let cleaned = clean_parsed_object(&parsed, &fields(&["target", "reason"]));
        assert_eq!(cleaned["target"], "two");
        assert_eq!(cleaned["reason"], serde_json::json!(["a"]));
    }

    #[test]
    fn test_clean_non_object_is_empty() {
        let cleaned = clean_parsed_object(&serde_json::json!([1, 2]), &fields(&["target"]));
        assert!(cleaned.is_empty());
    }

    #[test]
    fn test_schema_fields_follow_wire_names() {
        let mut names = WitchNightAction::object_schema().field_names();
        names.sort();
        assert_eq!(
            names,
            ["action", "healReason", "healTarget", "poisonReason", "poisonTarget"]
        );
        let mut vote = VotingResponse::object_schema().field_names();
        vote.sort();
        assert_eq!(vote, ["reason", "target"]);
    }

    #[test]
    fn test_decode_rejects_missing_required_field() {
        let schema = VotingResponse::object_schema();
        assert_eq!(schema.required_fields(), ["target", "reason"]);

        let reply = serde_json::json!({"target": 3, "reason": null});
        let err = decode::<VotingResponse>(reply, &schema).expect_err("Missing reason should fail");
        assert!(err.is_no_object());
        assert!(err.message.contains("reason"));

        let vote: VotingResponse =
            decode(serde_json::json!({"target": 3, "reason": "odd"}), &schema)
                .expect("Complete reply should decode");
        assert_eq!(vote.target, 3);
    }
}
