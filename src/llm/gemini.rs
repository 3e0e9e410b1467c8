use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompt_builder::PromptPair;
use super::{BackendKind, GenerationSettings, LlmClient};
use crate::error::BackendError;
use crate::report::Reporter;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const SUPPORTED_MODELS: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-2.5-flash",
    "gemini-2.5-pro",
];

/// Finish reasons that mean the answer was withheld.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

const BACKEND: BackendKind = BackendKind::Gemini;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    settings: GenerationSettings,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        settings: GenerationSettings,
        base_url: Option<String>,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(90)).build()?;
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client,
            api_key,
            settings,
            base_url: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn supported_models() -> &'static [&'static str] {
        SUPPORTED_MODELS
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.settings.model
        )
    }
}

/// Gemini reuses RESOURCE_EXHAUSTED for both per-minute limits and spent
/// quota, so the message text decides between the two.
pub fn classify_error(status: u16, body: &str, model: &str) -> BackendError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let (grpc_status, message) = match parsed {
        Some(err) => (err.status, err.message),
        None => (String::new(), body.trim().to_string()),
    };

    if matches!(grpc_status.as_str(), "UNAUTHENTICATED" | "PERMISSION_DENIED")
        || matches!(status, 401 | 403)
        || message.contains("API key not valid")
    {
        return BackendError::InvalidCredential {
            backend: BACKEND,
            detail: message,
        };
    }

    if grpc_status == "NOT_FOUND" || status == 404 {
        return BackendError::ModelNotFound {
            backend: BACKEND,
            model: model.to_string(),
        };
    }

    if grpc_status == "RESOURCE_EXHAUSTED" || status == 429 {
        let lower = message.to_lowercase();
        if lower.contains("exceeded your current quota") || lower.contains("billing") {
            return BackendError::QuotaExceeded {
                backend: BACKEND,
                detail: message,
            };
        }
        return BackendError::RateLimited {
            backend: BACKEND,
            detail: message,
        };
    }

    BackendError::Unknown {
        backend: BACKEND,
        message: format!("HTTP {status} - {message}"),
    }
}

/// Pull the generated text out of a successful response body.
pub fn extract_text(body: &str, reporter: &dyn Reporter) -> Result<String, BackendError> {
    let resp: GenerateResponse = serde_json::from_str(body).map_err(|e| BackendError::Unknown {
        backend: BACKEND,
        message: format!("failed to parse Gemini response: {e}"),
    })?;

    if let Some(usage) = &resp.usage_metadata {
        reporter.debug(&format!(
            "Token usage: prompt={}, candidates={}",
            usage.prompt_token_count,
            usage.candidates_token_count
        ));
    }

    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(BackendError::ContentBlocked {
            backend: BACKEND,
            reason,
        });
    }

    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Unknown {
            backend: BACKEND,
            message: "no candidates returned from Gemini".into(),
        })?;

    match candidate.finish_reason.as_deref() {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason) => {
            return Err(BackendError::ContentBlocked {
                backend: BACKEND,
                reason: reason.to_string(),
            });
        }
        Some("MAX_TOKENS") => {
            reporter.warn("Gemini stopped at the max token limit; the message may be truncated");
        }
        _ => {}
    }

    Ok(candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default())
}

impl LlmClient for GeminiClient {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn validate_credential(&self) -> bool {
        let key = self.api_key.trim();
        key.len() >= 30 && !key.chars().any(char::is_whitespace)
    }

    fn complete(
        &self,
        prompts: &PromptPair,
        reporter: &dyn Reporter,
    ) -> Result<String, BackendError> {
        let url = self.generate_url();
        let req = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &prompts.system,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &prompts.user,
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
            },
        };

        reporter.info(&format!("Calling Gemini model {:?}", self.settings.model));

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .map_err(|e| BackendError::Unknown {
                backend: BACKEND,
                message: format!("failed to send request to {url}: {e}"),
            })?;

        let status = resp.status();
        let text = resp.text().map_err(|e| BackendError::Unknown {
            backend: BACKEND,
            message: format!("failed to read Gemini response body: {e}"),
        })?;

        reporter.trace(&format!("Gemini raw response ({}): {text}", status.as_u16()));

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text, &self.settings.model));
        }

        extract_text(&text, reporter)
    }
}
