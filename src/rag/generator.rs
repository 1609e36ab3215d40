//! Answer generation behind a single capability trait.
//!
//! Backends only turn a prompt into text. [`AnswerGenerator`] owns the
//! policy around them: one call at a time per model instance, errors caught
//! at this boundary, and raw output validated before anyone trusts it.

use crate::error::{Result, SunnoError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// Answers shorter than this (in characters) are rejected.
pub const MIN_ANSWER_CHARS: usize = 15;
/// Minimum ratio of distinct words to total words.
pub const MIN_LEXICAL_UNIQUENESS: f32 = 0.25;

/// Labels models like to prepend to their answer.
const ANSWER_LABELS: &[&str] = &["answer:", "jawab:", "response:", "a:", "q:"];

/// Decoding strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoding {
    Greedy,
    Sampling { temperature: f32, top_p: f32 },
}

/// Options passed to every generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub max_new_tokens: usize,
    pub decoding: Decoding,
    /// Multiplicative penalty on repeated tokens (1.0 disables).
    pub repetition_penalty: Option<f32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_new_tokens: 200,
            decoding: Decoding::Greedy,
            repetition_penalty: Some(1.1),
        }
    }
}

/// A text generation model.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}

/// Why a generation result was not used.
#[derive(Debug, Clone, PartialEq)]
pub enum WeakReason {
    /// Nothing came back.
    Empty,
    /// Fewer than [`MIN_ANSWER_CHARS`] characters.
    TooShort(usize),
    /// Lexical uniqueness below [`MIN_LEXICAL_UNIQUENESS`].
    Repetitive(f32),
    /// The backend errored.
    Failed(String),
}

impl std::fmt::Display for WeakReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeakReason::Empty => write!(f, "empty output"),
            WeakReason::TooShort(n) => write!(f, "too short ({} chars)", n),
            WeakReason::Repetitive(u) => write!(f, "repetitive (uniqueness {:.2})", u),
            WeakReason::Failed(e) => write!(f, "backend failed: {}", e),
        }
    }
}

/// Result of one validated generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Accepted(String),
    Weak(WeakReason),
}

impl GenerationOutcome {
    /// Accepted answer text, or an empty string.
    pub fn into_text(self) -> String {
        match self {
            GenerationOutcome::Accepted(text) => text,
            GenerationOutcome::Weak(_) => String::new(),
        }
    }
}

/// Validate raw model output.
pub fn validate_answer(raw: &str) -> std::result::Result<String, WeakReason> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(WeakReason::Empty);
    }

    let chars = text.chars().count();
    if chars < MIN_ANSWER_CHARS {
        return Err(WeakReason::TooShort(chars));
    }

    let text = strip_labels(text);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Err(WeakReason::Empty);
    }

    let distinct: HashSet<&str> = words.iter().copied().collect();
    let uniqueness = distinct.len() as f32 / words.len() as f32;
    if uniqueness < MIN_LEXICAL_UNIQUENESS {
        return Err(WeakReason::Repetitive(uniqueness));
    }

    Ok(text.to_string())
}

fn strip_labels(mut text: &str) -> &str {
    'outer: loop {
        for label in ANSWER_LABELS {
            let matches = text
                .get(..label.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(label));
            if matches {
                text = text[label.len()..].trim_start();
                continue 'outer;
            }
        }
        return text;
    }
}

/// Validating, serialized front for a generation backend.
#[derive(Clone)]
pub struct AnswerGenerator {
    backend: Arc<dyn Generator>,
    options: GenerationOptions,
    slot: Arc<Semaphore>,
}

impl AnswerGenerator {
    /// Wrap a backend with its own single-call slot.
    pub fn new(backend: Arc<dyn Generator>, options: GenerationOptions) -> Self {
        Self {
            backend,
            options,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Share a slot with other wrappers around the same model instance.
    pub fn with_slot(mut self, slot: Arc<Semaphore>) -> Self {
        self.slot = slot;
        self
    }

    /// Generation options in use.
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Generate and validate. Never returns an error.
    #[instrument(skip(self, prompt), fields(backend = self.backend.name()))]
    pub async fn generate(&self, prompt: &str) -> GenerationOutcome {
        let _permit = match self.slot.acquire().await {
            Ok(permit) => permit,
            Err(e) => return GenerationOutcome::Weak(WeakReason::Failed(e.to_string())),
        };

        let raw = match self.backend.generate(prompt, &self.options).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Generation failed: {}", e);
                return GenerationOutcome::Weak(WeakReason::Failed(e.to_string()));
            }
        };

        match validate_answer(&raw) {
            Ok(answer) => {
                info!("Generated answer ({} chars)", answer.chars().count());
                GenerationOutcome::Accepted(answer)
            }
            Err(reason) => {
                debug!("Rejected generated answer: {}", reason);
                GenerationOutcome::Weak(reason)
            }
        }
    }
}

/// OpenAI chat completions backend.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAIGenerator {
    /// Create a backend for a chat model.
    pub fn new(model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| SunnoError::Generation(e.to_string()))?
                .into()];

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(options.max_new_tokens as u32);

        match options.decoding {
            Decoding::Greedy => {
                request.temperature(0.0);
            }
            Decoding::Sampling { temperature, top_p } => {
                request.temperature(temperature).top_p(top_p);
            }
        }

        // No multiplicative penalty in this API; map onto frequency_penalty.
        if let Some(penalty) = options.repetition_penalty {
            request.frequency_penalty((penalty - 1.0).clamp(0.0, 2.0));
        }

        let request = request
            .build()
            .map_err(|e| SunnoError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SunnoError::OpenAI(format!("Failed to generate response: {}", e)))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| SunnoError::Generation("Empty response from LLM".to_string()))
    }
}

#[derive(Serialize)]
struct TgiRequest<'a> {
    inputs: &'a str,
    parameters: TgiParameters,
}

#[derive(Serialize)]
struct TgiParameters {
    max_new_tokens: usize,
    do_sample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repetition_penalty: Option<f32>,
    return_full_text: bool,
}

#[derive(Deserialize)]
struct TgiResponse {
    generated_text: String,
}

/// Client for a text-generation-inference compatible `/generate` endpoint,
/// serving a local seq2seq or causal model.
pub struct TextGenerationClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TextGenerationClient {
    /// Create a client for a server base URL.
    pub fn new(endpoint: &str, timeout: std::time::Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn parameters(options: &GenerationOptions) -> TgiParameters {
        let (do_sample, temperature, top_p) = match options.decoding {
            Decoding::Greedy => (false, None, None),
            Decoding::Sampling { temperature, top_p } => (true, Some(temperature), Some(top_p)),
        };
        TgiParameters {
            max_new_tokens: options.max_new_tokens,
            do_sample,
            temperature,
            top_p,
            repetition_penalty: options.repetition_penalty,
            return_full_text: false,
        }
    }
}

#[async_trait]
impl Generator for TextGenerationClient {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let body = TgiRequest {
            inputs: prompt,
            parameters: Self::parameters(options),
        };

        let response: TgiResponse = self
            .http
            .post(format!("{}/generate", self.endpoint))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.generated_text)
    }
}

/// Backend that never generates, deferring every answer to extraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveOnly;

#[async_trait]
impl Generator for ExtractiveOnly {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
        Ok(String::new())
    }
}
