use crate::llm::prompts;
use crate::llm::{GenerationRequest, PullRequestContext};

pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// The four commit-message instruction shapes. Every combination of
/// candidate count and detail flag maps to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Single,
    SingleDetailed,
    Multi,
    MultiDetailed,
}

impl Template {
    pub fn select(candidate_count: u8, detailed: bool) -> Self {
        match (candidate_count > 1, detailed) {
            (false, false) => Template::Single,
            (false, true) => Template::SingleDetailed,
            (true, false) => Template::Multi,
            (true, true) => Template::MultiDetailed,
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Template::Single => prompts::SHAPE_SINGLE,
            Template::SingleDetailed => prompts::SHAPE_SINGLE_DETAILED,
            Template::Multi => prompts::SHAPE_MULTI,
            Template::MultiDetailed => prompts::SHAPE_MULTI_DETAILED,
        }
    }
}

pub fn system_prompt(candidate_count: u8, detailed: bool) -> String {
    let template = Template::select(candidate_count, detailed);
    let shape = template
        .shape()
        .replace("{count}", &candidate_count.to_string());

    format!(
        "{intro}\n\n{rules}\n\n{shape}",
        intro = prompts::COMMIT_INTRO,
        rules = prompts::COMMIT_RULES,
    )
}

pub fn user_prompt(diff: &str, description: Option<&str>) -> String {
    let mut user = String::from(prompts::COMMIT_LEAD_IN);
    user.push_str("\n\n");

    if let Some(desc) = description.map(str::trim).filter(|d| !d.is_empty()) {
        user.push_str("Context from the author:\n");
        user.push_str(desc);
        user.push_str("\n\n");
    }

    user.push_str("Diff:\n```diff\n");
    user.push_str(diff);
    if !diff.ends_with('\n') {
        user.push('\n');
    }
    user.push_str("```");
    user
}

pub fn commit_prompt(request: &GenerationRequest) -> PromptPair {
    PromptPair {
        system: system_prompt(request.candidate_count, request.detailed),
        user: user_prompt(&request.diff, request.description.as_deref()),
    }
}

pub fn pr_prompt(ctx: &PullRequestContext) -> PromptPair {
    let mut system = prompts::PR_INSTRUCTIONS.to_owned();
    if let Some(desc) = ctx.description.as_deref().filter(|d| !d.trim().is_empty()) {
        system.push_str("\nOverall goal according to the author: ");
        system.push_str(desc.trim());
    }

    let mut user = format!(
        "Base branch: {base}\nFeature branch: {from}\n\nCommits (oldest first):\n",
        base = ctx.base,
        from = ctx.from,
    );

    for item in &ctx.items {
        let short: String = item.commit_hash.chars().take(7).collect();
        let pr_tag = item
            .pr_number
            .map(|n| format!(" (PR #{n})"))
            .unwrap_or_default();
        user.push_str(&format!("- {short}{pr_tag}: {}\n", item.title.trim()));
        if !item.body.trim().is_empty() {
            user.push_str("  ");
            user.push_str(&item.body.trim().replace('\n', "\n  "));
            user.push('\n');
        }
    }

    if !ctx.diff.trim().is_empty() {
        user.push_str("\nCombined diff:\n```diff\n");
        user.push_str(ctx.diff.trim_end());
        user.push_str("\n```");
    }

    PromptPair { system, user }
}
