use crate::ai::types::{ChatMessage, ChatRequest, ContentBlock, ModelResponse, StopReason};
use crate::ai::ChatModel;
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 800;

/// Client for the Anthropic Messages API
#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<StopReason>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, String> {
        Self::new_with_endpoint(api_key, model, None, None)
    }

    pub fn new_with_endpoint(
        api_key: &str,
        model: &str,
        endpoint: Option<&str>,
        max_tokens: Option<u32>,
    ) -> Result<Self, String> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let key_value = header::HeaderValue::from_str(api_key)
            .map_err(|e| format!("Invalid API key format: {}", e))?;
        headers.insert("x-api-key", key_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or(ANTHROPIC_API_URL).to_string(),
            model: model.to_string(),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }
}

#[async_trait]
impl ChatModel for ClaudeClient {
    async fn complete(&self, request: ChatRequest) -> Result<ModelResponse, String> {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools)
        };
        let tool_choice = tools.as_ref().map(|_| json!({"type": "auto"}));

        let api_request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system: request.system,
            messages: request.messages,
            tools,
            tool_choice,
        };

        log::info!(
            "[CLAUDE] Sending request with model {} and {} tools",
            self.model,
            api_request.tools.as_ref().map(|t| t.len()).unwrap_or(0)
        );
        log::debug!(
            "[CLAUDE] Full request:\n{}",
            serde_json::to_string_pretty(&api_request).unwrap_or_default()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| format!("Anthropic API request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                return Err(format!("Anthropic API error: {}", error_response.error.message));
            }

            return Err(format!(
                "Anthropic API returned error status: {}, body: {}",
                status, error_text
            ));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read Anthropic response: {}", e))?;

        log::debug!("[CLAUDE] Raw response:\n{}", response_text);

        let response_data: MessagesResponse = serde_json::from_str(&response_text).map_err(|e| {
            format!(
                "Failed to parse Anthropic response: {} - body: {}",
                e, response_text
            )
        })?;

        log::info!(
            "[CLAUDE] Response - blocks: {}, stop_reason: {:?}",
            response_data.content.len(),
            response_data.stop_reason
        );

        Ok(ModelResponse {
            content: response_data.content,
            stop_reason: response_data.stop_reason.unwrap_or(StopReason::EndTurn),
        })
    }
}
