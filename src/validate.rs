//! Conventional Commits header check.
//!
//! Findings are advisory: callers warn and keep the message.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub const COMMIT_TYPES: [&str; 11] = [
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "chore", "ci", "build", "revert",
];

pub const MAX_HEADER_LEN: usize = 72;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(feat|fix|docs|style|refactor|perf|test|chore|ci|build|revert)(\([^)]+\))?: .{1,50}")
        .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Check the first line of `message`. The first failing rule wins.
pub fn validate(message: &str) -> Validation {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Validation::fail("commit message is empty");
    }

    let header = trimmed.lines().next().unwrap_or_default();

    if !HEADER.is_match(header) {
        return Validation::fail(format!(
            "header does not follow `<type>(<scope>): <description>` with type one of {}",
            COMMIT_TYPES.join(", ")
        ));
    }

    let len = header.chars().count();
    if len > MAX_HEADER_LEN {
        return Validation::fail(format!(
            "header is {len} characters; keep it to {MAX_HEADER_LEN} or fewer"
        ));
    }

    Validation::ok()
}
