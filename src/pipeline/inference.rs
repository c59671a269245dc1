//! Chat-completion client for an OpenAI-compatible local endpoint.
//!
//! One call per chunk against `{base}/chat/completions` (LM Studio style),
//! with a `{base}/models` health probe that must pass before any chunk is
//! dispatched. Sampling is pinned fully deterministic: the model's job is to
//! copy text and substitute placeholders, so any sampling freedom only adds
//! ways to rewrite content that must stay untouched.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

const TEMPERATURE: f32 = 0.0;
const TOP_P: f32 = 1.0;
const TOP_K: u32 = 1;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("cannot reach the inference endpoint at {0}")]
    Connection(String),

    #[error("inference call timed out after {0}s")]
    Timeout(u64),

    #[error("endpoint returned HTTP {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("model returned an empty completion")]
    EmptyCompletion,

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl InferenceError {
    /// Transient failures are absorbed by the bounded retry; anything else
    /// escalates immediately.
    fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_)
            | Self::Timeout(_)
            | Self::MalformedResponse(_)
            | Self::EmptyCompletion => true,
            Self::Endpoint { status, .. } => *status >= 500,
            Self::RetriesExhausted { .. } => false,
        }
    }
}

/// A successful completion plus how many retries it took.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub retries_used: u32,
}

/// Chat-completion abstraction (allows mocking the endpoint in tests).
pub trait ChatCompletion {
    /// Cheap reachability probe. Failure is fatal for the whole run and must
    /// happen before the first chunk is dispatched.
    fn check_health(&self) -> Result<(), InferenceError>;

    /// One system+user completion. Retries transient failures internally;
    /// exhaustion is reported as an error result, never a panic.
    fn generate(&self, system: &str, user: &str) -> Result<Generation, InferenceError>;
}

/// Run `call` up to `max_retries + 1` times with linear backoff
/// (`backoff_seconds × attempt`) between transient failures.
pub fn generate_with_retries(
    call: impl Fn() -> Result<String, InferenceError>,
    max_retries: u32,
    backoff_seconds: f64,
) -> Result<Generation, InferenceError> {
    for attempt in 0..=max_retries {
        match call() {
            Ok(text) => {
                return Ok(Generation {
                    text,
                    retries_used: attempt,
                })
            }
            Err(e) if e.is_transient() && attempt < max_retries => {
                let wait = backoff_seconds * (attempt + 1) as f64;
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    wait_seconds = wait,
                    error = %e,
                    "Transient inference failure, retrying"
                );
                if wait > 0.0 {
                    std::thread::sleep(Duration::from_secs_f64(wait));
                }
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                return Err(InferenceError::RetriesExhausted {
                    attempts: max_retries + 1,
                    last: e.to_string(),
                })
            }
        }
    }
    unreachable!("retry loop always returns")
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Request body for `/chat/completions`.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    stop: &'a [String],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response body from `/chat/completions`.
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Blocking HTTP client for an OpenAI-compatible completion endpoint.
pub struct HttpChatClient {
    base_url: String,
    api_key: String,
    model: String,
    max_output_tokens: u32,
    stop_sequences: Vec<String>,
    timeout_seconds: u64,
    max_retries: u32,
    backoff_seconds: f64,
    client: reqwest::blocking::Client,
}

impl HttpChatClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.inference.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.lm_api.base_url.trim_end_matches('/').to_string(),
            api_key: config.lm_api.api_key.clone(),
            model: config.lm_api.model.clone(),
            max_output_tokens: config.inference.max_output_tokens,
            stop_sequences: config.inference.stop_sequences.clone(),
            timeout_seconds: config.inference.timeout_seconds,
            max_retries: config.runtime.max_retries,
            backoff_seconds: config.runtime.retry_backoff_seconds,
            client,
        }
    }

    fn call_once(&self, system: &str, user: &str) -> Result<String, InferenceError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
            max_tokens: self.max_output_tokens,
            stop: &self.stop_sequences,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                InferenceError::MalformedResponse("response contains no choices".into())
            })?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(InferenceError::EmptyCompletion);
        }
        Ok(content)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_connect() {
            InferenceError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            InferenceError::Timeout(self.timeout_seconds)
        } else {
            InferenceError::Connection(e.to_string())
        }
    }
}

impl ChatCompletion for HttpChatClient {
    fn check_health(&self) -> Result<(), InferenceError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn generate(&self, system: &str, user: &str) -> Result<Generation, InferenceError> {
        generate_with_retries(
            || self.call_once(system, user),
            self.max_retries,
            self.backoff_seconds,
        )
    }
}

// ---------------------------------------------------------------------------
// Mock client
// ---------------------------------------------------------------------------

type MockResponder = Box<dyn Fn(&str, &str) -> Result<String, InferenceError> + Send + Sync>;

/// Mock endpoint for tests — scripted responses, no HTTP.
pub struct MockChatClient {
    responder: MockResponder,
    healthy: bool,
    calls: std::sync::atomic::AtomicU32,
}

impl MockChatClient {
    /// Identity stub: echoes the user turn verbatim.
    pub fn echo() -> Self {
        Self::with(|_, user| Ok(user.to_string()))
    }

    pub fn fixed(response: &str) -> Self {
        let response = response.to_string();
        Self::with(move |_, _| Ok(response.clone()))
    }

    pub fn with(
        responder: impl Fn(&str, &str) -> Result<String, InferenceError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            healthy: true,
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Every generate call fails as an exhausted retry cycle of `attempts`.
    pub fn always_timing_out(attempts: u32) -> Self {
        Self::with(move |_, _| {
            Err(InferenceError::RetriesExhausted {
                attempts,
                last: InferenceError::Timeout(120).to_string(),
            })
        })
    }

    /// Health probe fails; generate must never be reached.
    pub fn unreachable() -> Self {
        let mut mock = Self::with(|_, _| {
            Err(InferenceError::Connection("http://127.0.0.1:1/v1".into()))
        });
        mock.healthy = false;
        mock
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl ChatCompletion for MockChatClient {
    fn check_health(&self) -> Result<(), InferenceError> {
        if self.healthy {
            Ok(())
        } else {
            Err(InferenceError::Connection("http://127.0.0.1:1/v1".into()))
        }
    }

    fn generate(&self, system: &str, user: &str) -> Result<Generation, InferenceError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        (self.responder)(system, user).map(|text| Generation {
            text,
            retries_used: 0,
        })
    }
}
