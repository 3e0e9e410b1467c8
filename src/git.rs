use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::process::{Command as GitCommand, Stdio};
use std::sync::LazyLock;

use regex::Regex;

static PR_REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\d+)").unwrap());

const LOG_RECORD_END: &str = "---END---";

/// A commit in a PR range, plus any detected PR number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrItem {
    pub commit_hash: String,
    pub title: String,
    pub body: String,
    pub pr_number: Option<u32>,
}

/// Run a git command and capture stdout as String.
pub fn git_output(args: &[&str]) -> Result<String> {
    let output = GitCommand::new("git")
        .args(args)
        .output()
        .with_context(|| format!("failed to run git {:?}", args))?;

    if !output.status.success() {
        return Err(anyhow!(
            "git {:?} exited with status {:?}: {}",
            args,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Whether the working directory is inside a git work tree.
pub fn is_repository() -> bool {
    git_output(&["rev-parse", "--is-inside-work-tree"])
        .map(|out| out.trim() == "true")
        .unwrap_or(false)
}

/// Get the current branch name.
pub fn current_branch() -> Result<String> {
    let name = git_output(&["rev-parse", "--abbrev-ref", "HEAD"])?
        .trim()
        .to_string();
    Ok(name)
}

/// `git diff` with paths printed verbatim and always prefixed `a/` and `b/`,
/// whatever the user's `core.quotePath` or `diff.noprefix` settings.
fn diff_args<'a>(extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![
        "-c",
        "core.quotePath=false",
        "diff",
        "--src-prefix=a/",
        "--dst-prefix=b/",
    ];
    args.extend_from_slice(extra);
    args
}

/// Get the full staged diff with `context_lines` lines of context.
pub fn staged_diff(context_lines: u32) -> Result<String> {
    let unified = format!("--unified={context_lines}");
    git_output(&diff_args(&["--cached", "--no-color", &unified]))
}

/// Get a list of staged files.
pub fn staged_files() -> Result<Vec<String>> {
    let output = git_output(&diff_args(&["--cached", "--name-only", "-z"]))?;
    Ok(split_nul(&output))
}

/// Diff of `from` against its merge base with `base`.
pub fn range_diff(base: &str, from: &str, context_lines: u32) -> Result<String> {
    let unified = format!("--unified={context_lines}");
    let range = format!("{base}...{from}");
    git_output(&diff_args(&["--no-color", &unified, &range]))
}

/// Files touched between the merge base of `base` and `from`.
pub fn range_files(base: &str, from: &str) -> Result<Vec<String>> {
    let range = format!("{base}...{from}");
    let output = git_output(&diff_args(&["--name-only", "-z", &range]))?;
    Ok(split_nul(&output))
}

/// Split `-z` output into paths. Names are kept byte for byte, including
/// leading or trailing spaces.
fn split_nul(output: &str) -> Vec<String> {
    output
        .split('\0')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Find the first PR number in a string, based on '#123' pattern.
fn find_first_pr_number(text: &str) -> Option<u32> {
    PR_REFERENCE
        .captures_iter(text)
        .find_map(|caps| caps[1].parse().ok())
}

/// Collect commits between base..from as PrItem list, oldest first.
pub fn collect_pr_items(base: &str, from: &str) -> Result<Vec<PrItem>> {
    let range = format!("{base}..{from}");
    let format = format!("--pretty=format:%H%n%s%n%b%n{LOG_RECORD_END}");
    let log_output = git_output(&["log", "--reverse", &format, &range])?;
    Ok(parse_log(&log_output))
}

fn parse_log(log_output: &str) -> Vec<PrItem> {
    let separator = format!("\n{LOG_RECORD_END}");
    let mut items = Vec::new();

    for block in log_output.split(separator.as_str()) {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        let mut lines = block.lines();
        let Some(hash) = lines.next().map(|h| h.trim().to_string()) else {
            continue;
        };
        let title = lines.next().unwrap_or("").trim().to_string();
        let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();

        let pr_number = find_first_pr_number(&title).or_else(|| find_first_pr_number(&body));

        items.push(PrItem {
            commit_hash: hash,
            title,
            body,
            pr_number,
        });
    }

    items
}

/// Create a commit with exactly `message`. The message goes through stdin so
/// newlines survive; git applies any signing configuration itself.
pub fn create_commit(message: &str) -> Result<()> {
    let mut child = GitCommand::new("git")
        .args(["commit", "--cleanup=verbatim", "-F", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to run git commit")?;

    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("failed to open stdin for git commit"))?;
        stdin
            .write_all(message.as_bytes())
            .context("failed to pass the commit message to git")?;
    }

    let output = child
        .wait_with_output()
        .context("failed to wait for git commit")?;

    if !output.status.success() {
        return Err(anyhow!(
            "git commit exited with status {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    log::info!("{}", String::from_utf8_lossy(&output.stdout).trim());
    Ok(())
}
