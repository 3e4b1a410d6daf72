//! The wire protocol's JSON shapes: just enough structure to build request bodies
//! and read the fields callers need out of responses. This intentionally stops
//! short of a typed surface over every field Gemini can return; callers who need
//! more get the parsed [`serde_json::Value`] directly from the streaming manager or
//! the raw response body from [`crate::request::RequestCoordinator::generate`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// Generation parameters merged into the request body's `generationConfig`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(rename = "topP", skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(rename = "topK", skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i64>,
}

impl GenerationConfig {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.top_p.is_none() && self.top_k.is_none() && self.max_output_tokens.is_none()
    }
}

/// One entry of the top-level `safetySettings` array: a harm category paired with
/// the threshold at which the server should block content in that category.
#[derive(Debug, Clone, Serialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

/// Options accepted by every request-coordinator operation.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub backend: Option<crate::auth::Backend>,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
    pub system_instruction: Option<String>,
}

/// Normalizes caller input into the `contents` array every content endpoint expects:
/// a bare prompt becomes one user-role content with a single text part, while a
/// pre-built content list is forwarded unchanged.
pub enum GenerateInput {
    Prompt(String),
    Contents(Vec<Content>),
}

impl GenerateInput {
    pub fn into_contents(self) -> Vec<Content> {
        match self {
            GenerateInput::Prompt(text) => vec![Content::text(text)],
            GenerateInput::Contents(contents) => contents,
        }
    }
}

impl From<&str> for GenerateInput {
    fn from(value: &str) -> Self {
        GenerateInput::Prompt(value.to_string())
    }
}

impl From<String> for GenerateInput {
    fn from(value: String) -> Self {
        GenerateInput::Prompt(value)
    }
}

impl From<Vec<Content>> for GenerateInput {
    fn from(value: Vec<Content>) -> Self {
        GenerateInput::Contents(value)
    }
}

pub fn build_request_body(input: GenerateInput, opts: &RequestOptions) -> serde_json::Value {
    let mut body = serde_json::json!({
        "contents": input.into_contents(),
    });

    if !opts.generation_config.is_empty() {
        body["generationConfig"] = serde_json::to_value(&opts.generation_config).unwrap_or_default();
    }
    if !opts.safety_settings.is_empty() {
        body["safetySettings"] = serde_json::to_value(&opts.safety_settings).unwrap_or_default();
    }
    if let Some(instruction) = &opts.system_instruction {
        body["systemInstruction"] = serde_json::to_value(Content::text(instruction)).unwrap_or_default();
    }

    body
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountTokensResponse {
    #[serde(rename = "totalTokens")]
    pub total_tokens: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    #[serde(rename = "nextPageToken", default)]
    pub next_page_token: Option<String>,
}
