use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompt_builder::PromptPair;
use super::{BackendKind, GenerationSettings, LlmClient};
use crate::error::BackendError;
use crate::report::Reporter;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const SUPPORTED_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4.1",
    "gpt-4.1-mini",
    "gpt-4.1-nano",
    "gpt-5",
    "gpt-5-mini",
    "gpt-5-nano",
    "o3-mini",
    "o4-mini",
];

const BACKEND: BackendKind = BackendKind::OpenAi;

/// Minimal request/response structs for the Chat Completions API.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
}

/// OpenAI-based implementation of LlmClient.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    settings: GenerationSettings,
    api_base_url: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        settings: GenerationSettings,
        api_base_url: Option<String>,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(90)).build()?;

        let base = api_base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(OpenAiClient {
            client,
            api_key,
            settings,
            api_base_url: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn supported_models() -> &'static [&'static str] {
        SUPPORTED_MODELS
    }

    fn chat_url(&self) -> String {
        if self.api_base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.api_base_url)
        } else {
            format!("{}/v1/chat/completions", self.api_base_url)
        }
    }
}

/// Map an HTTP error response onto the shared error categories.
pub fn classify_error(status: u16, body: &str, model: &str) -> BackendError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error);

    let (message, code, kind) = match &parsed {
        Some(err) => (
            err.message.clone(),
            err.code.as_deref().unwrap_or_default(),
            err.kind.as_deref().unwrap_or_default(),
        ),
        None => (body.trim().to_string(), "", ""),
    };

    if status == 401 || code == "invalid_api_key" {
        return BackendError::InvalidCredential {
            backend: BACKEND,
            detail: message,
        };
    }

    if code == "insufficient_quota" || kind == "insufficient_quota" {
        return BackendError::QuotaExceeded {
            backend: BACKEND,
            detail: message,
        };
    }

    if status == 404 || code == "model_not_found" {
        return BackendError::ModelNotFound {
            backend: BACKEND,
            model: model.to_string(),
        };
    }

    if status == 429 || code == "rate_limit_exceeded" {
        return BackendError::RateLimited {
            backend: BACKEND,
            detail: message,
        };
    }

    if code == "content_policy_violation" || code == "content_filter" {
        return BackendError::ContentBlocked {
            backend: BACKEND,
            reason: message,
        };
    }

    BackendError::Unknown {
        backend: BACKEND,
        message: format!("HTTP {status} - {message}"),
    }
}

/// Pull the generated text out of a successful response body.
pub fn extract_text(body: &str, reporter: &dyn Reporter) -> Result<String, BackendError> {
    let chat_resp: ChatResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Unknown {
            backend: BACKEND,
            message: format!("failed to parse OpenAI response: {e}"),
        })?;

    if let Some(usage) = &chat_resp.usage {
        reporter.debug(&format!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        ));
    }

    let choice = chat_resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Unknown {
            backend: BACKEND,
            message: "no choices returned from OpenAI".into(),
        })?;

    if let Some(refusal) = choice.message.refusal {
        return Err(BackendError::ContentBlocked {
            backend: BACKEND,
            reason: refusal,
        });
    }

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(BackendError::ContentBlocked {
            backend: BACKEND,
            reason: "response withheld by the content filter".into(),
        });
    }

    if choice.finish_reason.as_deref() == Some("length") {
        reporter.warn("OpenAI stopped at the max token limit; the message may be truncated");
    }

    Ok(choice.message.content.unwrap_or_default())
}

impl LlmClient for OpenAiClient {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn validate_credential(&self) -> bool {
        let key = self.api_key.trim();
        key.starts_with("sk-") && key.len() > 20
    }

    fn complete(
        &self,
        prompts: &PromptPair,
        reporter: &dyn Reporter,
    ) -> Result<String, BackendError> {
        let url = self.chat_url();
        let req = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompts.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompts.user,
                },
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        reporter.info(&format!("Calling OpenAI model {:?}", req.model));

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .map_err(|e| BackendError::Unknown {
                backend: BACKEND,
                message: format!("failed to send request to {url}: {e}"),
            })?;

        let status = resp.status();
        let text = resp.text().map_err(|e| BackendError::Unknown {
            backend: BACKEND,
            message: format!("failed to read OpenAI response body: {e}"),
        })?;

        reporter.trace(&format!("OpenAI raw response ({}): {text}", status.as_u16()));

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text, &self.settings.model));
        }

        extract_text(&text, reporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(key: &str) -> OpenAiClient {
        OpenAiClient::new(
            key.into(),
            GenerationSettings {
                model: DEFAULT_MODEL.into(),
                max_tokens: 100,
                temperature: 0.2,
            },
            Some("https://proxy.example/v1/".into()),
        )
        .unwrap()
    }

    #[test]
    fn chat_url_avoids_double_version() {
        assert_eq!(
            client("sk-x").chat_url(),
            "https://proxy.example/v1/chat/completions"
        );
    }

    #[test]
    fn credential_needs_prefix_and_length() {
        assert!(client("sk-proj-abcdefghijklmnopqrstuvwxyz").validate_credential());
        assert!(!client("sk-short").validate_credential());
        assert!(!client("pk-abcdefghijklmnopqrstuvwxyz").validate_credential());
        assert!(!client("").validate_credential());
    }

    #[test]
    fn request_serializes_sampling_parameters() {
        let req = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 64,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
