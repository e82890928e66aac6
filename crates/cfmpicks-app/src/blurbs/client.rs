// Claude API streaming client using reqwest-eventsource.
//
// Sends one message to the Anthropic Messages API with `stream: true` and
// concatenates the text deltas into a single completion.

use futures_util::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde_json::Value;
use tracing::{debug, warn};

use cfmpicks_core::config::Config;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// ClaudeClient
// ---------------------------------------------------------------------------

pub struct ClaudeClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key,
            model,
        }
    }

    /// Point the client at a different messages endpoint.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Stream a completion and return the full text.
    ///
    /// Errors if the request cannot be opened, the stream fails before any
    /// text arrives, or the model produces nothing.
    pub async fn complete(
        &self,
        system: &str,
        user_content: &str,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "stream": true,
            "system": system,
            "messages": [{ "role": "user", "content": user_content }]
        });

        let request = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let mut es = request
            .eventsource()
            .map_err(|e| anyhow::anyhow!("failed to create event source: {e}"))?;

        let mut full_text = String::new();
        let mut output_tokens: u32 = 0;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => debug!("SSE connection opened"),
                Ok(Event::Message(msg)) => match msg.event.as_str() {
                    "content_block_delta" => {
                        if let Some(text) = parse_delta_text(&msg.data) {
                            full_text.push_str(&text);
                        }
                    }
                    "message_delta" => {
                        if let Some(n) = parse_output_tokens(&msg.data) {
                            output_tokens = n;
                        }
                    }
                    "message_stop" => {
                        debug!(output_tokens, "message_stop");
                        es.close();
                        break;
                    }
                    "error" => {
                        es.close();
                        anyhow::bail!("model returned an error event: {}", msg.data);
                    }
                    // ping, message_start, content_block_start/stop
                    other => debug!(event_type = other, "ignoring SSE event"),
                },
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    es.close();
                    break;
                }
                Err(err) => {
                    warn!(?err, "SSE stream error");
                    es.close();
                    if full_text.is_empty() {
                        anyhow::bail!(extract_error_message(&err));
                    }
                    break;
                }
            }
        }

        let text = full_text.trim();
        if text.is_empty() {
            anyhow::bail!("stream ended without any content");
        }
        Ok(text.to_string())
    }
}

// ---------------------------------------------------------------------------
// BlurbClient wrapper
// ---------------------------------------------------------------------------

/// Either a live Claude client or nothing.
pub enum BlurbClient {
    Active(ClaudeClient),
    Disabled,
}

impl BlurbClient {
    /// `Active` when an API key is present in credentials.
    pub fn from_config(config: &Config) -> Self {
        match &config.credentials.anthropic_api_key {
            Some(key) if !key.is_empty() => BlurbClient::Active(ClaudeClient::new(
                key.clone(),
                config.blurbs.model.clone(),
            )),
            _ => BlurbClient::Disabled,
        }
    }

    pub async fn complete(
        &self,
        system: &str,
        user_content: &str,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        match self {
            BlurbClient::Active(client) => client.complete(system, user_content, max_tokens).await,
            BlurbClient::Disabled => anyhow::bail!("LLM not configured"),
        }
    }
}

// ---------------------------------------------------------------------------
// SSE JSON parsing helpers
// ---------------------------------------------------------------------------

/// Extract `delta.text` from a `content_block_delta` event's JSON.
///
/// Expected shape: `{ "type": "content_block_delta", "delta": { "type": "text_delta", "text": "..." } }`
pub(crate) fn parse_delta_text(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("delta")?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extract `output_tokens` from a `message_delta` event's JSON.
pub(crate) fn parse_output_tokens(data: &str) -> Option<u32> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("usage")?
        .get("output_tokens")?
        .as_u64()
        .map(|n| n as u32)
}

fn extract_error_message(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _response) => {
            format!("API returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => format!("Network error: {e}"),
        other => format!("Stream error: {other}"),
    }
}
