//! Glue between a backend and the selection step.

use crate::error::{CredentialError, Error, ParseError};
use crate::llm::{GenerationRequest, LlmClient};
use crate::report::Reporter;
use crate::response::{self, Candidate};

/// Split generated text into finished candidates according to the request shape.
pub fn candidates_from_text(
    text: &str,
    request: &GenerationRequest,
) -> Result<Vec<Candidate>, ParseError> {
    let messages = match (request.candidate_count > 1, request.detailed) {
        (false, false) => vec![response::clean(text)?],
        (false, true) => vec![response::format_detailed(text)?],
        (true, false) => response::parse_choices(text)?,
        (true, true) => response::parse_detailed_choices(text)?,
    };

    Ok(messages
        .iter()
        .map(|message| Candidate::from_message(message))
        .collect())
}

/// Refuse to contact a backend whose credential is obviously unusable.
pub fn ensure_credential(client: &dyn LlmClient) -> Result<(), CredentialError> {
    if client.validate_credential() {
        return Ok(());
    }
    let backend = client.kind();
    Err(CredentialError::Malformed {
        backend,
        hint: backend.credential_hint(),
    })
}

/// One backend round-trip, parsed into candidates.
pub fn generate_candidates(
    client: &dyn LlmClient,
    request: &GenerationRequest,
    reporter: &dyn Reporter,
) -> Result<Vec<Candidate>, Error> {
    ensure_credential(client)?;

    reporter.info(&format!(
        "Requesting {} candidate(s) from {} ({})",
        request.candidate_count,
        client.kind(),
        client.model()
    ));

    let result = client.generate(request, reporter)?;
    reporter.debug(&format!("Raw response:\n{}", result.text));

    let candidates = candidates_from_text(&result.text, request)?;

    let wanted = usize::from(request.candidate_count);
    if wanted > 1 && candidates.len() != wanted {
        reporter.warn(&format!(
            "Asked {} for {wanted} candidates but got {}",
            client.kind(),
            candidates.len()
        ));
    }

    Ok(candidates)
}
