//! Claude Messages API suggester
//!
//! Sends one short prompt per description and reads a JSON object back:
//!
//! ```text
//! POST {base}/v1/messages
//! x-api-key: ...
//! anthropic-version: 2023-06-01
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::parsing::parse_suggestion;
use super::{CategorySuggester, CategorySuggestion};
use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 128;

const SYSTEM_PROMPT: &str = "You categorize bank transactions. \
Reply with a single JSON object of the form \
{\"category\": \"<one of the offered categories>\", \"confidence\": <0.0-1.0>} \
and nothing else.";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<RequestMessage>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn text(&self) -> Option<String> {
        let texts: Vec<_> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}

/// Category suggester backed by Claude
#[derive(Clone)]
pub struct AnthropicSuggester {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for AnthropicSuggester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicSuggester")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AnthropicSuggester {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    fn prompt(description: &str, categories: &[String]) -> String {
        format!(
            "Categories: {}\n\nTransaction description: {}\n\n\
             Pick the single best category from the list.",
            categories.join(", "),
            description
        )
    }
}

#[async_trait]
impl CategorySuggester for AnthropicSuggester {
    async fn suggest(&self, description: &str, categories: &[String]) -> Result<CategorySuggestion> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![RequestMessage {
                role: "user",
                content: Self::prompt(description, categories),
            }],
        };

        debug!(model = %self.model, description, "Sending category request to Claude");

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ai(format!("Claude API error ({}): {}", status, body)));
        }

        let messages_response: MessagesResponse = response.json().await?;
        let text = messages_response
            .text()
            .ok_or_else(|| Error::Ai("No text in Claude response".into()))?;

        parse_suggestion(&text)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
