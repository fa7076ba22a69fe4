// Streaming client for the hosted chat-completion endpoint.
//
// One request per user submission, no retry, no cancellation: once sent the
// stream runs to completion or failure. Token deltas are forwarded over an
// mpsc channel so the network concern stays decoupled from rendering.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::constants;
use crate::error::CundiError;

/// Incremental events pushed to the display sink while a reply streams in.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEvent {
    Start,
    Token { text: String },
    Done,
    Error { error: String },
}

/// One role-tagged message of a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

// Structures matching the /v1/chat/completions wire format.
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Debug, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Payload of one server-sent-event line.
#[derive(Debug, PartialEq)]
enum SsePayload {
    Delta(String),
    Done,
}

/// Parses a single SSE line. Comment lines, blank lines, chunks without a
/// text delta and unparseable JSON all yield `None`.
fn parse_sse_line(line: &str) -> Option<SsePayload> {
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(SsePayload::Done);
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .first()
            .and_then(|choice| choice.delta.content.clone())
            .filter(|text| !text.is_empty())
            .map(SsePayload::Delta),
        Err(e) => {
            warn!("Failed to parse SSE chunk: {} - Error: {}", data, e);
            None
        }
    }
}

/// Handle to the completion endpoint. Carries its own HTTP client and
/// credentials so tests can point it at a mock server.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Builds the client from the environment. A missing API key is the one
    /// fatal startup condition of the whole program.
    pub fn from_env() -> Result<Self, CundiError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| CundiError::MissingApiKey)?;
        Ok(Self::new(
            constants::OPENAI_API_URL.clone(),
            api_key,
            constants::CUNDI_MODEL.clone(),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Issues one streaming completion request. Each token delta is pushed to
    /// `tx` as it arrives; the full accumulated reply is returned once the
    /// stream ends. Every failure path also emits a `TokenEvent::Error` so
    /// the display sink can surface it.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tx: mpsc::Sender<TokenEvent>,
    ) -> Result<String, CundiError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: constants::TEMPERATURE,
            stream: true,
        };

        debug!(model = %self.model, messages = messages.len(), "Sending completion request");

        let response = match self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Completion request failed: {}", e);
                let err = CundiError::from(e);
                let _ = tx.send(TokenEvent::Error { error: err.to_string() }).await;
                return Err(err);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, %error_text, "Completion endpoint returned an error");
            let err = CundiError::Upstream(format!("{status}: {error_text}"));
            let _ = tx.send(TokenEvent::Error { error: err.to_string() }).await;
            return Err(err);
        }

        let _ = tx.send(TokenEvent::Start).await;

        let mut stream = response.bytes_stream();
        // SSE lines can be split across network chunks; buffer until '\n'.
        let mut pending: Vec<u8> = Vec::new();
        let mut accumulated = String::new();

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Stream error: {}", e);
                    let err = CundiError::Upstream(format!("stream error: {e}"));
                    let _ = tx.send(TokenEvent::Error { error: err.to_string() }).await;
                    return Err(err);
                }
            };

            pending.extend_from_slice(&bytes);
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                match parse_sse_line(line.trim()) {
                    Some(SsePayload::Delta(text)) => {
                        accumulated.push_str(&text);
                        let _ = tx.send(TokenEvent::Token { text }).await;
                    }
                    Some(SsePayload::Done) => {
                        let _ = tx.send(TokenEvent::Done).await;
                        return Ok(accumulated);
                    }
                    None => {}
                }
            }
        }

        // Endpoint closed the stream without a terminator; treat what we got
        // as the full reply.
        let _ = tx.send(TokenEvent::Done).await;
        Ok(accumulated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hola"}}]}"#;
        assert_eq!(
            parse_sse_line(line),
            Some(SsePayload::Delta("Hola".to_string()))
        );
    }

    #[test]
    fn test_parse_sse_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SsePayload::Done));
    }

    #[test]
    fn test_parse_sse_ignores_non_data_lines() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: ping"), None);
    }

    #[test]
    fn test_parse_sse_ignores_empty_delta() {
        // The final chunk before [DONE] typically carries no content.
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(line), None);
        let line = r#"data: {"choices":[]}"#;
        assert_eq!(parse_sse_line(line), None);
    }

    #[test]
    fn test_parse_sse_ignores_malformed_json() {
        assert_eq!(parse_sse_line("data: {not json"), None);
    }

    #[test]
    fn test_chat_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
        assert_eq!(ChatMessage::assistant("a").role, "assistant");
    }
}
