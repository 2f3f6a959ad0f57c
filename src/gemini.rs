//! Gemini API client
//!
//! Sends the running conversation to the hosted model and returns its reply.
//! Uses a long-lived reqwest::Client for connection pooling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::ModelSettings;
use crate::error::ChatError;
use crate::memory::{ChatMessage, MessageRole};

/// A conversational model that answers a full message history
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> crate::Result<String>;
}

/// Builds a model client for a credential
pub trait ModelProvider: Send + Sync {
    fn build(&self, api_key: &str) -> crate::Result<Arc<dyn ChatModel>>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    temperature: f32,
    convert_system_message_to_human: bool,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, settings: &ModelSettings) -> crate::Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingCredential);
        }

        let mut builder = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/models/{}:generateContent",
                settings.base_url.trim_end_matches('/'),
                settings.model
            ),
            temperature: settings.temperature,
            convert_system_message_to_human: settings.convert_system_message_to_human,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, messages: &[ChatMessage]) -> GeminiRequest {
        build_request(messages, self.temperature, self.convert_system_message_to_human)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(&self, messages: &[ChatMessage]) -> crate::Result<String> {
        let request = self.build_request(messages);

        info!(turns = request.contents.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                ChatError::Upstream(format!("Gemini API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(ChatError::Upstream(describe_error(status.as_u16(), &error_text)));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            ChatError::Upstream(format!("Gemini parse error: {}", e))
        })?;

        let answer = extract_text(&gemini_response)?;

        if let Some(usage) = &gemini_response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                reply_tokens = usage.candidates_token_count,
                "Gemini usage"
            );
        }
        info!(chars = answer.len(), "Gemini response received");

        Ok(answer)
    }
}

/// Provider that builds real Gemini clients
pub struct GeminiProvider {
    settings: ModelSettings,
}

impl GeminiProvider {
    pub fn new(settings: ModelSettings) -> Self {
        Self { settings }
    }
}

impl ModelProvider for GeminiProvider {
    fn build(&self, api_key: &str) -> crate::Result<Arc<dyn ChatModel>> {
        let client = GeminiClient::new(api_key, &self.settings)?;
        info!(
            model = %self.settings.model,
            temperature = self.settings.temperature,
            "Gemini client ready"
        );
        Ok(Arc::new(client))
    }
}

/// Map the history onto Gemini's `contents`.
///
/// With `fold_system` set, system text is prepended to the next user turn;
/// otherwise it becomes the system instruction.
fn build_request(messages: &[ChatMessage], temperature: f32, fold_system: bool) -> GeminiRequest {
    let mut contents = Vec::with_capacity(messages.len());
    let mut pending_system: Vec<&str> = Vec::new();

    for msg in messages {
        match msg.role {
            MessageRole::System => pending_system.push(&msg.content),
            MessageRole::User => {
                let text = if fold_system && !pending_system.is_empty() {
                    let merged = format!("{}\n\n{}", pending_system.join("\n\n"), msg.content);
                    pending_system.clear();
                    merged
                } else {
                    msg.content.clone()
                };
                contents.push(Content::new("user", text));
            }
            MessageRole::Assistant => contents.push(Content::new("model", msg.content.clone())),
        }
    }

    // Nothing followed the system text, or it goes out as an instruction.
    let system_instruction = if pending_system.is_empty() {
        None
    } else if fold_system {
        contents.push(Content::new("user", pending_system.join("\n\n")));
        None
    } else {
        Some(SystemInstruction {
            parts: vec![Part {
                text: pending_system.join("\n\n"),
            }],
        })
    };

    GeminiRequest {
        contents,
        generation_config: GenerationConfig { temperature },
        system_instruction,
    }
}

fn extract_text(response: &GeminiResponse) -> crate::Result<String> {
    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| ChatError::Upstream("No response from Gemini API".to_string()))?;

    let text: String = candidate
        .content
        .as_ref()
        .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect::<String>())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(ChatError::Upstream(format!(
            "Empty response from Gemini (finish reason: {})",
            reason
        )));
    }

    Ok(text)
}

fn describe_error(status: u16, body: &str) -> String {
    let message = serde_json::from_str::<GeminiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    if message.is_empty() {
        format!("Gemini API error ({})", status)
    } else {
        format!("Gemini API error ({}): {}", status, message)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

impl Content {
    fn new(role: &str, text: String) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![ContentPart { text: Some(text) }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i32,
    #[serde(default)]
    candidates_token_count: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}
