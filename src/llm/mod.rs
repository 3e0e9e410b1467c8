pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod prompt_builder;
mod prompts;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{BackendError, Error, ParseError};
use crate::git::PrItem;
use crate::report::Reporter;
use crate::response;

use prompt_builder::PromptPair;

/// The closed set of text-generation services we can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[value(name = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

impl BackendKind {
    /// Identifier used in config files and environment variables.
    pub fn id(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Anthropic => "anthropic",
            BackendKind::Gemini => "gemini",
            BackendKind::Ollama => "ollama",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "OpenAI",
            BackendKind::Anthropic => "Anthropic",
            BackendKind::Gemini => "Gemini",
            BackendKind::Ollama => "Ollama",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => openai::DEFAULT_MODEL,
            BackendKind::Anthropic => anthropic::DEFAULT_MODEL,
            BackendKind::Gemini => gemini::DEFAULT_MODEL,
            BackendKind::Ollama => ollama::DEFAULT_MODEL,
        }
    }

    pub fn supported_models(&self) -> &'static [&'static str] {
        match self {
            BackendKind::OpenAi => openai::OpenAiClient::supported_models(),
            BackendKind::Anthropic => anthropic::AnthropicClient::supported_models(),
            BackendKind::Gemini => gemini::GeminiClient::supported_models(),
            BackendKind::Ollama => ollama::OllamaClient::supported_models(),
        }
    }

    /// Environment variable holding the API key, if the backend needs one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            BackendKind::OpenAi => Some("OPENAI_API_KEY"),
            BackendKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            BackendKind::Gemini => Some("GEMINI_API_KEY"),
            BackendKind::Ollama => None,
        }
    }

    /// What a well-formed key looks like, for error messages.
    pub fn credential_hint(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "OpenAI keys start with `sk-`",
            BackendKind::Anthropic => "Anthropic keys start with `sk-ant-`",
            BackendKind::Gemini => "Gemini keys are at least 30 characters with no spaces",
            BackendKind::Ollama => "Ollama does not use an API key",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "anthropic" | "claude" => Ok(BackendKind::Anthropic),
            "gemini" | "google" => Ok(BackendKind::Gemini),
            "ollama" => Ok(BackendKind::Ollama),
            other => Err(format!(
                "unknown backend '{other}' (expected openai, anthropic, gemini or ollama)"
            )),
        }
    }
}

/// Model and sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// What to generate, independent of any backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub diff: String,
    pub description: Option<String>,
    pub candidate_count: u8,
    pub detailed: bool,
}

impl GenerationRequest {
    pub fn new(diff: impl Into<String>) -> Self {
        Self {
            diff: diff.into(),
            description: None,
            candidate_count: 1,
            detailed: false,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_candidates(mut self, count: u8) -> Self {
        self.candidate_count = count.max(1);
        self
    }

    pub fn with_detail(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    /// Multi-choice or detailed output carries structure the parser needs,
    /// so it skips single-message cleaning.
    pub fn wants_structure(&self) -> bool {
        self.detailed || self.candidate_count > 1
    }
}

/// Inputs for a pull-request description.
#[derive(Debug, Clone)]
pub struct PullRequestContext {
    pub base: String,
    pub from: String,
    pub items: Vec<PrItem>,
    pub diff: String,
    pub description: Option<String>,
}

/// Backend output, before candidate parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub text: String,
    pub backend: BackendKind,
    pub model: String,
}

/// A text-generation backend.
///
/// Implementors provide one network round-trip in [`LlmClient::complete`];
/// prompt rendering and post-processing are shared.
pub trait LlmClient: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn model(&self) -> &str;

    /// Local, syntactic check of the configured credential. Never calls out.
    fn validate_credential(&self) -> bool;

    /// Send the rendered prompts and return the raw response text.
    ///
    /// Usage, truncation and request tracing go to `reporter`.
    fn complete(
        &self,
        prompts: &PromptPair,
        reporter: &dyn Reporter,
    ) -> Result<String, BackendError>;

    /// Generate a commit message (or several) for the request.
    fn generate(
        &self,
        request: &GenerationRequest,
        reporter: &dyn Reporter,
    ) -> Result<GenerationResult, Error> {
        let prompts = prompt_builder::commit_prompt(request);

        reporter.trace(&format!(
            "{} commit prompt ({:?}):\n{}",
            self.kind(),
            prompt_builder::Template::select(request.candidate_count, request.detailed),
            truncate(&prompts.user, 3000)
        ));

        let raw = self.complete(&prompts, reporter)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyResponse.into());
        }

        let text = if request.wants_structure() {
            trimmed.to_string()
        } else {
            response::clean(trimmed)?
        };

        Ok(GenerationResult {
            text,
            backend: self.kind(),
            model: self.model().to_string(),
        })
    }

    /// Generate a pull-request description. The trimmed response is returned as-is.
    fn describe_pull_request(
        &self,
        ctx: &PullRequestContext,
        reporter: &dyn Reporter,
    ) -> Result<GenerationResult, Error> {
        let prompts = prompt_builder::pr_prompt(ctx);

        reporter.trace(&format!(
            "{} PR description prompt:\n{}",
            self.kind(),
            truncate(&prompts.user, 3500)
        ));

        let raw = self.complete(&prompts, reporter)?;
        let text = raw.trim();
        if text.is_empty() {
            return Err(ParseError::EmptyResponse.into());
        }

        Ok(GenerationResult {
            text: text.to_string(),
            backend: self.kind(),
            model: self.model().to_string(),
        })
    }
}

/// Truncate long strings for trace logging.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}...\n[truncated {} bytes]", &s[..idx], s.len() - idx),
    }
}
