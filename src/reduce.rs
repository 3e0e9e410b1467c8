//! Shrinks a unified diff before it is sent to a backend.
//!
//! The reducer is a token-saving approximation, not a semantic diff. It only
//! ever drops or tidies content lines:
//!
//! * a removed line directly followed by an added line with the same trimmed
//!   content is a formatting-only change, and both lines are dropped;
//! * lines whose content is nothing but a comment are dropped, except that
//!   `#` and `*` lines in prose files (Markdown, reStructuredText, plain text)
//!   are headings and bullets and stay;
//! * runs of blank lines collapse to a single blank line;
//! * lines longer than [`LONG_LINE`] characters lose trailing whitespace and
//!   repeated interior spaces.
//!
//! File and hunk headers (`diff --git`, `index`, `---`, `+++`, `@@`) always
//! pass through untouched. Each rule is checked against the lines already
//! emitted, so reducing an already reduced diff is a no-op.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};

/// Lines at or below this many characters are never re-spaced.
pub const LONG_LINE: usize = 100;

const STRUCTURAL_PREFIXES: &[&str] = &["diff --git", "index ", "---", "+++", "@@"];

/// Comment markers that mean the same thing in every file.
static COMMENT_ONLY: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([r"^//", r"^/\*", r"^\*/", r"^--\s", r"^<!--.*-->$", r"^;;"]).unwrap()
});

/// Comment markers in code only: block-comment continuations and hash
/// comments. Prose files use the same prefixes for bullets and headings.
static CODE_COMMENT_ONLY: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new([r"^\*(\s|$)", r"^#(\s|$)"]).unwrap());

const PROSE_EXTENSIONS: &[&str] = &[
    ".md",
    ".markdown",
    ".mdx",
    ".rst",
    ".txt",
    ".adoc",
    ".asciidoc",
    ".org",
];

static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

/// Whether a line is a file or hunk header that must survive reduction.
pub fn is_structural(line: &str) -> bool {
    STRUCTURAL_PREFIXES.iter().any(|p| line.starts_with(p))
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Split a content line into its diff marker and the text after it.
fn split_marker(line: &str) -> (Option<char>, &str) {
    match line.chars().next() {
        Some(c @ ('+' | '-' | ' ')) => (Some(c), &line[1..]),
        _ => (None, line),
    }
}

fn is_comment_only(line: &str, prose: bool) -> bool {
    let (marker, content) = split_marker(line);
    let content = content.trim();
    marker.is_some()
        && (COMMENT_ONLY.is_match(content) || (!prose && CODE_COMMENT_ONLY.is_match(content)))
}

/// For a header naming a file, whether that file is prose.
fn prose_file(line: &str) -> Option<bool> {
    let name = match line.strip_prefix("+++ ") {
        Some("/dev/null") => return None,
        Some(name) => name,
        None => line.strip_prefix("diff --git ")?,
    };
    let name = name.trim_end_matches(['\t', '"']).to_ascii_lowercase();
    Some(PROSE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

fn is_removed(line: &str) -> bool {
    line.starts_with('-') && !is_structural(line)
}

fn is_added(line: &str) -> bool {
    line.starts_with('+') && !is_structural(line)
}

/// Collapse spacing on long lines, keeping the marker and indentation.
fn normalize_long_line(line: &str) -> String {
    if line.chars().count() <= LONG_LINE {
        return line.to_string();
    }

    let (marker, rest) = split_marker(line);
    let body = rest.trim_start();
    let indent = &rest[..rest.len() - body.len()];
    let body = SPACE_RUN.replace_all(body.trim_end(), " ");

    let mut out = String::with_capacity(line.len());
    if let Some(m) = marker {
        out.push(m);
    }
    out.push_str(indent);
    out.push_str(&body);
    out
}

/// Reduce a unified diff. Idempotent.
pub fn reduce(diff: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut prose = false;

    for line in diff.lines() {
        if is_structural(line) {
            if let Some(is_prose) = prose_file(line) {
                prose = is_prose;
            }
            out.push(line.to_string());
            continue;
        }

        if is_blank(line) {
            if out.last().is_some_and(|prev| is_blank(prev)) {
                continue;
            }
            out.push(line.to_string());
            continue;
        }

        let line = normalize_long_line(line);

        if is_comment_only(&line, prose) {
            continue;
        }

        if is_added(&line) {
            let added = line[1..].trim();
            let paired = !added.is_empty()
                && out
                    .last()
                    .is_some_and(|prev| is_removed(prev) && prev[1..].trim() == added);
            if paired {
                out.pop();
                continue;
            }
        }

        out.push(line);
    }

    let mut reduced = out.join("\n");
    if diff.ends_with('\n') && !reduced.is_empty() {
        reduced.push('\n');
    }
    reduced
}
