//! LLM backends: OpenAI via async-openai and OpenAI-compatible HTTP endpoints.

use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
};
use async_trait::async_trait;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

/// One generation call.
#[derive(Debug, Clone, PartialEq, Getters, new)]
pub struct GenerationRequest {
    prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl GenerationRequest {
    /// Returns the same request with a different prompt.
    pub fn with_prompt(&self, prompt: String) -> Self {
        Self {
            prompt,
            ..self.clone()
        }
    }
}

/// Named JSON schema a structured response must satisfy.
#[derive(Debug, Clone, PartialEq, Getters, new)]
pub struct ObjectSchema {
    name: String,
    schema: Value,
}

impl ObjectSchema {
    /// Top-level property names declared by the schema.
    pub fn field_names(&self) -> Vec<String> {
        self.schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Property names the schema lists as required.
    pub fn required_fields(&self) -> Vec<String> {
        self.schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fields of `required_fields` that are absent or `null` in `value`.
    pub fn missing_fields(&self, value: &Value) -> Vec<String> {
        self.required_fields()
            .into_iter()
            .filter(|name| value.get(name).is_none_or(Value::is_null))
            .collect()
    }

    /// Pretty-printed property map, used to describe the shape in a prompt.
    pub fn describe(&self) -> String {
        let properties = self.schema.get("properties").unwrap_or(&self.schema);
        serde_json::to_string_pretty(properties).unwrap_or_else(|_| properties.to_string())
    }
}

/// A model that can produce free text or schema-shaped objects.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Asks for a JSON object conforming to `schema`.
    ///
    /// Fails with [`LlmErrorKind::NoObjectGenerated`] when the model replied
    /// but no object could be read from the reply.
    async fn generate_object(
        &self,
        request: &GenerationRequest,
        schema: &ObjectSchema,
    ) -> Result<Value, LlmError>;

    /// Asks for free text.
    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

/// Reads the JSON object out of a structured reply.
#[instrument(skip(content))]
pub fn parse_object_content(content: Option<String>) -> Result<Value, LlmError> {
    let content = content.ok_or_else(|| {
        LlmError::no_object("No object generated: response had no content".to_string())
    })?;

    match serde_json::from_str::<Value>(content.trim()) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(LlmError::no_object(
            "No object generated: response was not a JSON object".to_string(),
        )),
        Err(e) => Err(LlmError::no_object(format!(
            "No object generated: could not parse the response: {}",
            e
        ))),
    }
}

/// OpenAI backend built on async-openai.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    /// Creates a backend for `model` authenticated with `api_key`.
    #[instrument(skip(api_key), fields(model = %model))]
    pub fn new(api_key: String, model: String) -> Self {
        debug!("Creating OpenAI client");
        let client = OpenAIClient::with_config(OpenAIConfig::new().with_api_key(api_key));
        Self { client, model }
    }

    #[instrument(skip(self, request, schema), fields(model = %self.model, structured = schema.is_some()))]
    async fn complete(
        &self,
        request: &GenerationRequest,
        schema: Option<&ObjectSchema>,
    ) -> Result<Option<String>, LlmError> {
        debug!("Building chat completion request");
        let messages = vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt().as_str())
                .build()
                .map_err(|e| LlmError::backend(format!("Failed to build user message: {}", e)))?,
        )];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .max_completion_tokens(*request.max_tokens())
            .temperature(*request.temperature());

        if let Some(schema) = schema {
            args.response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: schema.name().clone(),
                    schema: Some(schema.schema().clone()),
                    strict: Some(false),
                },
            });
        }

        let chat_request = args
            .build()
            .map_err(|e| LlmError::backend(format!("Failed to build request: {}", e)))?;

        debug!("Sending request to OpenAI");
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| LlmError::backend(format!("OpenAI API error: {}", e)))?;

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone()))
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn generate_object(
        &self,
        request: &GenerationRequest,
        schema: &ObjectSchema,
    ) -> Result<Value, LlmError> {
        let content = self.complete(request, Some(schema)).await?;
        parse_object_content(content)
    }

    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let content = self
            .complete(request, None)
            .await?
            .ok_or_else(|| LlmError::backend("No content in OpenAI response".to_string()))?;
        info!(content_length = content.len(), "Generated completion");
        Ok(content)
    }
}

/// Backend for any endpoint speaking the OpenAI chat-completions protocol
/// (OpenRouter, MiniMax, self-hosted gateways).
#[derive(Debug, Clone)]
pub struct CompatibleBackend {
    client: reqwest::Client,
    name: String,
    base_url: String,
    api_key: String,
    model: String,
}

impl CompatibleBackend {
    /// Creates a backend; `headers` are sent with every request.
    #[instrument(skip(api_key, headers), fields(name = %name, base_url = %base_url, model = %model))]
    pub fn new(
        name: String,
        base_url: String,
        api_key: String,
        model: String,
        headers: &[(String, String)],
    ) -> Result<Self, LlmError> {
        debug!("Creating OpenAI-compatible client");
        let mut header_map = reqwest::header::HeaderMap::new();
        for (key, value) in headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| LlmError::backend(format!("Invalid header name {}: {}", key, e)))?;
            let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                LlmError::backend(format!("Invalid header value for {}: {}", key, e))
            })?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .build()
            .map_err(|e| LlmError::backend(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    #[instrument(skip(self, request, schema), fields(provider = %self.name, model = %self.model, structured = schema.is_some()))]
    async fn complete(
        &self,
        request: &GenerationRequest,
        schema: Option<&ObjectSchema>,
    ) -> Result<Option<String>, LlmError> {
        debug!("Building chat completion request");
        let mut request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens(),
            "temperature": request.temperature(),
            "messages": [
                {
                    "role": "user",
                    "content": request.prompt()
                }
            ]
        });

        if let Some(schema) = schema {
            request_body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name(),
                    "schema": schema.schema(),
                }
            });
        }

        debug!(provider = %self.name, "Sending chat completion request");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::backend(format!("{} request failed: {}", self.name, e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::backend(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            error!(status = %status, response = %response_text, "Chat completion API error");
            return Err(LlmError::backend(format!(
                "{} API error {}: {}",
                self.name, status, response_text
            )));
        }

        debug!(response_length = response_text.len(), "Parsing chat completion response");
        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| LlmError::backend(format!("Failed to parse response: {}", e)))?;

        Ok(response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string))
    }
}

#[async_trait]
impl LlmBackend for CompatibleBackend {
    async fn generate_object(
        &self,
        request: &GenerationRequest,
        schema: &ObjectSchema,
    ) -> Result<Value, LlmError> {
        let content = self.complete(request, Some(schema)).await?;
        parse_object_content(content)
    }

    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let content = self.complete(request, None).await?.ok_or_else(|| {
            LlmError::backend(format!("No text content in {} response", self.name))
        })?;
        info!(content_length = content.len(), "Generated completion");
        Ok(content)
    }
}

/// What kind of failure a backend reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LlmErrorKind {
    /// The model answered but no schema-shaped object could be read.
    #[display("no object generated")]
    NoObjectGenerated,
    /// Transport, API or request-building failure.
    #[display("backend")]
    Backend,
}

/// LLM client error.
#[derive(Debug, Clone, Display, Error)]
#[display("LLM error ({}): {} at {}:{}", kind, message, file, line)]
pub struct LlmError {
    /// Failure category.
    pub kind: LlmErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl LlmError {
    /// Creates a new LLM error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: LlmErrorKind, message: String) -> Self {
        let loc = std::panic::Location::caller();
        error!(error_kind = %kind, error_message = %message, "LLM error created");
        Self {
            kind,
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Creates a "no object generated" error.
    #[track_caller]
    pub fn no_object(message: String) -> Self {
        Self::new(LlmErrorKind::NoObjectGenerated, message)
    }

    /// Creates a backend failure.
    #[track_caller]
    pub fn backend(message: String) -> Self {
        Self::new(LlmErrorKind::Backend, message)
    }

    /// Whether this is the recoverable "no object generated" condition.
    pub fn is_no_object(&self) -> bool {
        self.kind == LlmErrorKind::NoObjectGenerated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_content_accepts_object() {
        let value = parse_object_content(Some(" {\"speech\": \"hi\"} ".to_string()))
            .expect("Object should parse");
        assert_eq!(value["speech"], "hi");
    }

    #[test]
    fn test_parse_object_content_reports_no_object() {
        for content in [None, Some("not json".to_string()), Some("[1, 2]".to_string())] {
            let err = parse_object_content(content).expect_err("Should fail");
            assert!(err.is_no_object());
        }
    }

    #[test]
    fn test_object_schema_fields_and_description() {
        let schema = ObjectSchema::new(
            "vote".to_string(),
            serde_json::json!({
                "type": "object",
                "properties": {"target": {"type": "integer"}, "reason": {"type": "string"}}
            }),
        );
        let mut fields = schema.field_names();
        fields.sort();
        assert_eq!(fields, ["reason", "target"]);
        assert!(schema.describe().contains("\"target\""));
    }
}
