//! Completion provider abstraction and implementations.
//!
//! Defines the [`CompletionProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when completion is not configured.
//! - **[`OpenRouterProvider`]** — calls an OpenAI-compatible streaming
//!   chat-completions API with retry and backoff on the initial request.
//!
//! The provider is treated as untrusted and unreliable: it may fail before
//! the first chunk (surfaced as an error from
//! [`CompletionProvider::stream_completion`]) or mid-stream (surfaced as an
//! `Err` item inside the returned stream).
//!
//! # Retry Strategy
//!
//! The initial request uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! A failure after streaming has begun is never retried; the pipeline
//! surfaces it to the caller instead.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::config::CompletionConfig;

/// Incremental answer text, in provider arrival order.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for streaming text-completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"qwen/qwen-2.5-72b-instruct"`).
    fn model_name(&self) -> &str;

    /// Submit a prompt and return the chunk stream for one answer.
    async fn stream_completion(&self, prompt: &str) -> Result<CompletionStream>;
}

/// Create the appropriate [`CompletionProvider`] based on configuration.
pub fn create_provider(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openrouter" => Ok(Arc::new(OpenRouterProvider::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// A no-op provider that always returns errors.
///
/// Used when `completion.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl CompletionProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn stream_completion(&self, _prompt: &str) -> Result<CompletionStream> {
        bail!("Completion provider is disabled")
    }
}

// ============ OpenRouter Provider ============

/// Streaming provider for OpenRouter's OpenAI-compatible API.
///
/// Requires the `OPENROUTER_API_KEY` environment variable to be set.
pub struct OpenRouterProvider {
    model: String,
    base_url: String,
    timeout_secs: u64,
    max_retries: u32,
    temperature: f64,
    max_tokens: u32,
}

impl OpenRouterProvider {
    /// Create a new OpenRouter provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config or if
    /// `OPENROUTER_API_KEY` is not in the environment.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenRouter provider"))?;

        if std::env::var("OPENROUTER_API_KEY").is_err() {
            bail!("OPENROUTER_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream_completion(&self, prompt: &str) -> Result<CompletionStream> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY not set"))?;

        // Connect timeout only: the answer stream itself may legitimately
        // run longer than any fixed request budget.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .header("HTTP-Referer", "https://counsel-harness.local")
                .header("X-Title", "Counsel Harness")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        debug!(model = %self.model, attempt, "completion stream opened");
                        return Ok(sse_content_stream(Box::pin(response.bytes_stream())));
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Completion API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Completion API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion request failed after retries")))
    }
}

// ============ SSE parsing ============

struct SseState<S> {
    inner: S,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn a raw SSE byte stream into a stream of answer-text chunks.
///
/// Parses complete `data:` lines only, so multi-byte characters split
/// across network reads are never decoded across a partial boundary.
/// `data: [DONE]` ends the stream; a transport error becomes a terminal
/// `Err` item.
fn sse_content_stream<S, B, E>(bytes: S) -> CompletionStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = SseState {
        inner: bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(futures::stream::try_unfold(state, |mut st| async move {
        loop {
            if let Some(chunk) = st.pending.pop_front() {
                return Ok(Some((chunk, st)));
            }
            if st.done {
                return Ok(None);
            }

            match st.inner.next().await {
                Some(Ok(bytes)) => {
                    st.buffer.extend_from_slice(bytes.as_ref());
                    while let Some(pos) = st.buffer.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = st.buffer.drain(..=pos).collect();
                        match classify_line(&line) {
                            SseLine::Content(content) => st.pending.push_back(content),
                            SseLine::Done => {
                                st.done = true;
                                break;
                            }
                            SseLine::Skip => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    return Err(
                        anyhow::Error::new(e).context("completion stream failed mid-answer")
                    );
                }
                None => {
                    st.done = true;
                    // A provider may close the connection without a trailing
                    // newline; a complete final data line still counts.
                    let line = std::mem::take(&mut st.buffer);
                    if let SseLine::Content(content) = classify_line(&line) {
                        st.pending.push_back(content);
                    }
                }
            }
        }
    }))
}

enum SseLine {
    Content(String),
    Done,
    Skip,
}

/// Classify one raw SSE line: answer content, the `[DONE]` terminator, or
/// a frame to skip (comments, role/finish frames, blank keep-alives).
fn classify_line(line: &[u8]) -> SseLine {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();

    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match parse_delta(data) {
        Some(content) if !content.is_empty() => SseLine::Content(content),
        _ => SseLine::Skip,
    }
}

/// Extract `choices[0].delta.content` from one SSE data payload.
///
/// Payloads without content (role frames, finish frames, malformed JSON)
/// yield `None` and are skipped.
fn parse_delta(data: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    value["choices"][0]["delta"]["content"]
        .as_str()
        .map(|s| s.to_string())
}
