//! Turning free-form backend output into commit-message candidates.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;

static FENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[\w.+-]*\s*$").unwrap());

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]\s*(.+)$").unwrap());

const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')];

/// One finished commit message: a header and an optional bullet body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub header: String,
    pub body: Option<String>,
}

impl Candidate {
    /// Split a finished message on its first blank line.
    pub fn from_message(message: &str) -> Self {
        match message.split_once("\n\n") {
            Some((header, body)) if !body.trim().is_empty() => Self {
                header: header.trim().to_string(),
                body: Some(body.trim_end().to_string()),
            },
            _ => Self {
                header: message.trim().to_string(),
                body: None,
            },
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(body) => write!(f, "{}\n\n{}", self.header, body),
            None => f.write_str(&self.header),
        }
    }
}

/// Strip exactly one trailing period.
pub fn strip_trailing_period(s: &str) -> &str {
    s.strip_suffix('.').unwrap_or(s)
}

fn strip_wrapping_quotes(s: &str) -> &str {
    for (open, close) in QUOTE_PAIRS {
        if let Some(inner) = s.strip_prefix(*open).and_then(|r| r.strip_suffix(*close)) {
            return inner;
        }
    }
    s
}

/// Reduce a single-message response to a bare header line.
pub fn clean(text: &str) -> Result<String, ParseError> {
    let unfenced = text
        .trim()
        .lines()
        .filter(|line| !FENCE_LINE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
        .replace('`', "");

    let unquoted = strip_wrapping_quotes(unfenced.trim());
    let first = unquoted.lines().next().unwrap_or_default().trim();

    if first.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    Ok(strip_trailing_period(first).to_string())
}

/// Parse a numbered list of headers. Text without any numbered line is
/// treated as one message.
pub fn parse_choices(text: &str) -> Result<Vec<String>, ParseError> {
    let choices: Vec<String> = text
        .lines()
        .filter_map(|line| NUMBERED.captures(line.trim()))
        .map(|caps| strip_trailing_period(caps[1].trim()).to_string())
        .filter(|choice| !choice.is_empty())
        .collect();

    if choices.is_empty() {
        return Ok(vec![clean(text)?]);
    }

    Ok(choices)
}

/// Parse a numbered list where each entry carries its own bullet body.
///
/// Lines before the first numbered entry are dropped. Without any numbered
/// line the whole text is one detailed message.
pub fn parse_detailed_choices(text: &str) -> Result<Vec<String>, ParseError> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();

    for line in text.lines() {
        if let Some(caps) = NUMBERED.captures(line.trim()) {
            if let Some(header) = caps.get(1) {
                blocks.push(vec![header.as_str()]);
            }
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }

    if blocks.is_empty() {
        return Ok(vec![format_detailed(text)?]);
    }

    blocks
        .iter()
        .map(|block| format_detailed(&block.join("\n")))
        .collect()
}

/// Normalize a header plus optional bullet body.
pub fn format_detailed(text: &str) -> Result<String, ParseError> {
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());

    let header = match lines.next() {
        Some(line) => strip_trailing_period(line.trim()).to_string(),
        None => return Err(ParseError::EmptyResponse),
    };
    if header.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let rest: Vec<&str> = lines.collect();
    let has_body = rest.iter().any(|l| l.trim_start().starts_with('-'));

    if !has_body {
        let remainder = rest.join("\n");
        if remainder.trim().is_empty() {
            return Ok(header);
        }
        return Ok(format!("{header}\n{remainder}"));
    }

    let mut body: Vec<&str> = rest
        .iter()
        .skip_while(|l| l.trim().is_empty())
        .map(|l| l.trim_end())
        .collect();
    while body.last().is_some_and(|l| l.is_empty()) {
        body.pop();
    }

    Ok(format!("{header}\n\n{}", body.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_strips_quotes_and_period() {
        assert_eq!(clean("\"feat: add x.\"").unwrap(), "feat: add x");
        assert_eq!(clean("“fix: curly quotes”").unwrap(), "fix: curly quotes");
    }

    #[test]
    fn clean_removes_fences_and_inline_code() {
        let text = "```text\nfeat: add `parse_args` helper\n```";
        assert_eq!(clean(text).unwrap(), "feat: add parse_args helper");
    }

    #[test]
    fn clean_keeps_first_line_only() {
        assert_eq!(
            clean("  chore: bump deps\n\nextra explanation").unwrap(),
            "chore: bump deps"
        );
    }

    #[test]
    fn clean_strips_only_one_period() {
        assert_eq!(clean("docs: wait for it..").unwrap(), "docs: wait for it.");
    }

    #[test]
    fn clean_rejects_empty_content() {
        assert_eq!(clean("   "), Err(ParseError::EmptyResponse));
        assert_eq!(clean("```\n```"), Err(ParseError::EmptyResponse));
        assert_eq!(clean("\"\""), Err(ParseError::EmptyResponse));
    }

    #[test]
    fn numbered_choices_keep_order() {
        assert_eq!(
            parse_choices("1. feat: a\n2. fix: b\n3. docs: c").unwrap(),
            vec!["feat: a", "fix: b", "docs: c"]
        );
    }

    #[test]
    fn choices_accept_parens_and_skip_chatter() {
        let text = "Here you go:\n1) feat: a.\n  2) feat: a\n\nHope that helps";
        assert_eq!(parse_choices(text).unwrap(), vec!["feat: a", "feat: a"]);
    }

    #[test]
    fn unnumbered_text_falls_back_to_clean() {
        assert_eq!(
            parse_choices("not a list").unwrap(),
            vec![clean("not a list").unwrap()]
        );
        assert_eq!(parse_choices(""), Err(ParseError::EmptyResponse));
    }

    #[test]
    fn detailed_inserts_blank_line_before_bullets() {
        let text = "feat: add login.\n- add form\n- add session store\n\n";
        assert_eq!(
            format_detailed(text).unwrap(),
            "feat: add login\n\n- add form\n- add session store"
        );
    }

    #[test]
    fn detailed_keeps_single_blank_line() {
        let text = "\nfix: handle eof\n\n\n  - stop at eof   \n";
        assert_eq!(
            format_detailed(text).unwrap(),
            "fix: handle eof\n\n  - stop at eof"
        );
    }

    #[test]
    fn detailed_without_bullets_keeps_remainder() {
        assert_eq!(format_detailed("refactor: split module.").unwrap(), "refactor: split module");
        assert_eq!(
            format_detailed("refactor: split module\nmoved helpers").unwrap(),
            "refactor: split module\nmoved helpers"
        );
    }

    #[test]
    fn detailed_choices_group_bullets_under_headers() {
        let text = "Options:\n1. feat: add login\n- add form\n\n2. feat(auth): add session\n- store token\n- expire token";
        assert_eq!(
            parse_detailed_choices(text).unwrap(),
            vec![
                "feat: add login\n\n- add form".to_string(),
                "feat(auth): add session\n\n- store token\n- expire token".to_string(),
            ]
        );
    }

    #[test]
    fn detailed_choices_fall_back_to_one_message() {
        assert_eq!(
            parse_detailed_choices("feat: x\n- y").unwrap(),
            vec!["feat: x\n\n- y"]
        );
    }

    #[test]
    fn candidate_splits_on_blank_line() {
        let c = Candidate::from_message("feat: x\n\n- y\n- z");
        assert_eq!(c.header, "feat: x");
        assert_eq!(c.body.as_deref(), Some("- y\n- z"));
        assert_eq!(c.to_string(), "feat: x\n\n- y\n- z");
        assert_eq!(Candidate::from_message("fix: y").body, None);
    }
}
