//! Remote OpenAI-compatible backend
//!
//! Talks to any `/chat/completions` endpoint: api.openai.com or a
//! self-hosted proxy named in `[model] base_url`. Streaming uses the SSE
//! framing those endpoints emit: `data: {json}` lines terminated by
//! `data: [DONE]`.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{clean_response, LlmBackend, LlmError, TextStream};
use crate::config::defaults;
use crate::config::settings::ModelConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f64,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// One parsed server-sent-event line.
#[derive(Debug, PartialEq)]
enum SseEvent {
    /// A text fragment from a `data: {json}` line.
    Fragment(String),
    /// The `data: [DONE]` terminator.
    Done,
    /// Blank lines, comments, empty deltas.
    Skip,
}

fn parse_sse_line(line: &str) -> Result<SseEvent, LlmError> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| LlmError::InvalidResponse(format!("bad SSE chunk: {e}")))?;
    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
    {
        Some(text) if !text.is_empty() => Ok(SseEvent::Fragment(text)),
        _ => Ok(SseEvent::Skip),
    }
}

/// Backend for a remote chat completions API.
pub struct RemoteBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    max_tokens: usize,
    temperature: f64,
    no_think: bool,
}

impl RemoteBackend {
    pub fn new(cfg: &ModelConfig) -> Result<Self, LlmError> {
        let key = cfg
            .remote_api_key()
            .ok_or_else(|| LlmError::Backend("no API key configured".into()))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|_| LlmError::Backend("API key contains invalid characters".into()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(defaults::LLM_HTTP_TIMEOUT_SECS))
            .build()?;

        let base = if cfg.base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            cfg.base_url.trim_end_matches('/')
        };

        Ok(Self {
            client,
            url: format!("{base}/chat/completions"),
            model: cfg.remote_model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            no_think: cfg.no_think,
        })
    }

    fn request_body(&self, prompt: &str, stream: bool) -> ChatRequest {
        // Reasoning models skip their thinking phase when told /no_think.
        let content = if self.no_think {
            format!("/no_think {prompt}")
        } else {
            prompt.to_string()
        };
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
        }
    }
}

#[async_trait]
impl LlmBackend for RemoteBackend {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "remote completion request");
        let resp = self
            .client
            .post(&self.url)
            .json(&self.request_body(prompt, false))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!("{status}: {body}")));
        }

        let parsed: ChatResponse = resp.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".into()))?;
        Ok(clean_response(&text))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        debug!(model = %self.model, "remote streaming request");
        let resp = self
            .client
            .post(&self.url)
            .json(&self.request_body(prompt, true))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!("{status}: {body}")));
        }

        let bytes = resp.bytes_stream();
        let stream = stream::unfold(
            (bytes, String::new(), false),
            |(mut bytes, mut buf, failed)| async move {
                if failed {
                    return None;
                }
                loop {
                    if let Some(pos) = buf.find('\n') {
                        let line: String = buf.drain(..=pos).collect();
                        match parse_sse_line(&line) {
                            Ok(SseEvent::Fragment(text)) => {
                                return Some((Ok(text), (bytes, buf, false)))
                            }
                            Ok(SseEvent::Done) => return None,
                            Ok(SseEvent::Skip) => continue,
                            Err(e) => return Some((Err(e), (bytes, buf, true))),
                        }
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => buf.push_str(&String::from_utf8_lossy(&chunk)),
                        Some(Err(e)) => {
                            return Some((Err(LlmError::Http(e)), (bytes, buf, true)))
                        }
                        None => return None,
                    }
                }
            },
        );
        Ok(stream.boxed())
    }

    fn name(&self) -> &'static str {
        "remote chat completions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_line_yields_fragment() {
        let line = r#"data: {"choices":[{"delta":{"content":"Temp"}}]}"#;
        assert_eq!(
            parse_sse_line(line).unwrap(),
            SseEvent::Fragment("Temp".into())
        );
    }

    #[test]
    fn done_marker_terminates() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), SseEvent::Done);
    }

    #[test]
    fn blank_and_comment_lines_skip() {
        assert_eq!(parse_sse_line("").unwrap(), SseEvent::Skip);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseEvent::Skip);
    }

    #[test]
    fn empty_delta_skips() {
        let line = r#"data: {"choices":[{"delta":{}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), SseEvent::Skip);
    }

    #[test]
    fn malformed_chunk_is_invalid_response() {
        let result = parse_sse_line("data: {not json");
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn no_think_prefixes_prompt() {
        let cfg = ModelConfig {
            api_key: "sk-test".into(),
            no_think: true,
            ..ModelConfig::default()
        };
        let backend = RemoteBackend::new(&cfg).unwrap();
        let body = backend.request_body("hello", false);
        assert!(body.messages[0].content.starts_with("/no_think hello"));
    }

    #[test]
    fn missing_key_fails_construction() {
        let cfg = ModelConfig::default();
        if std::env::var("THERMOWATCH_API_KEY").is_ok() {
            return; // environment already provides a key
        }
        assert!(matches!(
            RemoteBackend::new(&cfg),
            Err(LlmError::Backend(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_tolerated() {
        let cfg = ModelConfig {
            api_key: "sk-test".into(),
            base_url: "http://localhost:11434/v1/".into(),
            ..ModelConfig::default()
        };
        let backend = RemoteBackend::new(&cfg).unwrap();
        assert_eq!(backend.url, "http://localhost:11434/v1/chat/completions");
    }
}
