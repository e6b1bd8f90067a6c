//! Streaming LLM client.
//!
//! Talks to an Ollama-style `/generate` endpoint that streams
//! newline-delimited JSON objects of the form `{"response": "...",
//! "done": false}`. Partial `response` fragments are concatenated until
//! the `done` flag appears, under a per-call timeout.
//!
//! The client also supports an **offline mode** (no endpoint configured):
//! every call returns the caller's default immediately. Tests and
//! LLM-less deployments run through exactly the same code path as the
//! live client, minus the HTTP round trip.

use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::extract;
use crate::log::{CallLog, CallRecord};
use crate::prompts;
use crate::sanitize;

/// Configuration for the generation endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base API URL (e.g. `http://127.0.0.1:11434/api`). `None` puts the
    /// client in offline mode.
    pub api_url: Option<String>,
    /// Model name passed through to the endpoint.
    pub model: String,
    /// Per-call timeout in seconds. Long prompts need several minutes.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: Some("http://127.0.0.1:11434/api".to_owned()),
            model: "deepseek-r1:14b".to_owned(),
            timeout_secs: 300,
        }
    }
}

/// Async client for the streaming text-generation endpoint.
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
    log: CallLog,
}

impl LlmClient {
    /// Create a client from configuration.
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            log: CallLog::new(),
        }
    }

    /// Create a client with no endpoint: every call returns its default.
    pub fn offline() -> Self {
        Self::new(LlmConfig {
            api_url: None,
            ..LlmConfig::default()
        })
    }

    /// True when no endpoint is configured.
    pub fn is_offline(&self) -> bool {
        self.config.api_url.is_none()
    }

    /// The bounded call log, read-only.
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Render a prompt, run it, and return the sanitized typed output.
    ///
    /// `default` carries the expected output shape: a string default means
    /// plain text, a list/map default means JSON (the prompt gets the
    /// JSON-coercion suffix). On any failure -- unknown key, network
    /// error, timeout, unparseable output -- the default is returned and a
    /// log entry is still written. This function never fails.
    pub async fn generate(
        &self,
        prompt_key: &str,
        args: &[String],
        special_instruction: &str,
        default: Value,
    ) -> Value {
        let Some(body) = prompts::template(prompt_key) else {
            warn!(prompt_key, "unknown prompt key");
            self.log.push(CallRecord {
                prompt_key: prompt_key.to_owned(),
                prompt: String::new(),
                raw_response: format!("unknown prompt key: {prompt_key}"),
                output: default.clone(),
                at: Utc::now(),
            });
            return default;
        };

        let prompt = prompts::render(body, args);
        let expect_json = !default.is_string();
        let wrapped = wrap_prompt(&prompt, special_instruction, expect_json, &default);

        let raw = if self.is_offline() {
            Err(LlmError::Offline)
        } else {
            self.stream_generate(&wrapped).await
        };

        let (raw_text, mut output) = match raw {
            Ok(text) => {
                let parsed = if expect_json {
                    extract::extract_output(&text, &default)
                } else {
                    Value::String(text.trim().to_owned())
                };
                (text, parsed)
            }
            Err(err) => {
                if !matches!(err, LlmError::Offline) {
                    warn!(prompt_key, error = %err, "LLM call failed, using default");
                }
                (err.to_string(), default.clone())
            }
        };

        sanitize::sanitize_value(&mut output);

        self.log.push(CallRecord {
            prompt_key: prompt_key.to_owned(),
            prompt,
            raw_response: raw_text,
            output: output.clone(),
            at: Utc::now(),
        });

        output
    }

    /// Stream the endpoint's NDJSON response and concatenate the
    /// `response` fragments until `done`.
    async fn stream_generate(&self, prompt: &str) -> Result<String, LlmError> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(timeout, self.stream_generate_inner(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.config.timeout_secs)),
        }
    }

    async fn stream_generate_inner(&self, prompt: &str) -> Result<String, LlmError> {
        let api_url = self.config.api_url.as_deref().ok_or(LlmError::Offline)?;
        let url = format!("{api_url}/generate");

        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": true,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut full = String::new();
        let mut line_buffer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::Request(format!("stream error: {e}")))?;
            line_buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = line_buffer.find('\n') {
                let line: String = line_buffer.drain(..=newline).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Ok(obj) = serde_json::from_str::<Value>(line) else {
                    debug!(line, "skipping unparseable stream line");
                    continue;
                };
                if let Some(fragment) = obj.get("response").and_then(Value::as_str) {
                    full.push_str(fragment);
                }
                if obj.get("done").and_then(Value::as_bool) == Some(true) {
                    return Ok(full);
                }
            }
        }

        // Stream ended without a done flag; return what arrived.
        Ok(full)
    }
}

/// Wrap the rendered prompt with the language instruction and, for JSON
/// outputs, the single-`output`-key coercion suffix with an example.
fn wrap_prompt(prompt: &str, special_instruction: &str, expect_json: bool, default: &Value) -> String {
    let language = "請務必使用繁體中文（Traditional Chinese）回答。";
    if expect_json {
        format!(
            "\"\"\"\n{}\n\"\"\"\nOutput the response to the prompt above in json. {special_instruction} {language}\nExample output json\n```json\n{}\n```",
            prompt.trim(),
            serde_json::json!({ "output": default }),
        )
    } else {
        format!("{}\n{special_instruction} {language}", prompt.trim())
    }
}
