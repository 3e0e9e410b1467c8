use anyhow::{Context, Result};
use clap::Parser;
use crossterm::tty::IsTty;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde_json::json;
use std::io;
use std::time::Duration;

use commitscribe::changeset::Changeset;
use commitscribe::cli_args::{Cli, Command};
use commitscribe::config::Config;
use commitscribe::error::InputError;
use commitscribe::git;
use commitscribe::llm::{GenerationRequest, PullRequestContext};
use commitscribe::logging::init_logger;
use commitscribe::pipeline;
use commitscribe::report::LogReporter;
use commitscribe::select::{self, Mode, Selection, TerminalInput};
use commitscribe::setup::build_llm_client;

fn spinner(hidden: bool, message: &'static str) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn print_preview(title: &str, body: &str) {
    let heading = format!("----- {title} Preview -----");
    println!();
    println!("{heading}");
    println!("{body}");
    println!("{}", "-".repeat(heading.len()));
}

fn print_candidates(candidates: &[String]) {
    println!();
    println!("----- Commit Message Candidates -----");
    for (idx, candidate) in candidates.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        let mut lines = candidate.lines();
        println!("{}) {}", idx + 1, lines.next().unwrap_or_default());
        for line in lines {
            println!("   {line}");
        }
    }
    println!("-------------------------------------");
}

/// Commit mode: one backend call for the staged diff, then choose and commit.
fn run_commit(cli: &Cli, cfg: &Config) -> Result<()> {
    let files = git::staged_files()?;
    let diff = git::staged_diff(cfg.context_lines)?;

    let changeset = Changeset::build(&files, &diff, &cfg.exclude)?;
    if !changeset.has_changes() {
        return Err(InputError::NoSubstantiveChanges.into());
    }

    info!(
        "Describing {} of {} staged file(s): {}",
        changeset.files().len(),
        files.len(),
        changeset.files().join(", ")
    );

    let client = build_llm_client(cfg)?;
    let request = GenerationRequest::new(changeset.diff())
        .with_description(cfg.description.clone())
        .with_candidates(cli.candidates)
        .with_detail(cli.detailed);

    let reporter = LogReporter;
    let progress = spinner(cli.json, "Generating commit message...");
    let generated = pipeline::generate_candidates(client.as_ref(), &request, &reporter);
    progress.finish_and_clear();

    let messages: Vec<String> = generated?.iter().map(ToString::to_string).collect();

    let mode = if cli.wants_interaction() && io::stdin().is_tty() {
        Mode::Interactive
    } else {
        Mode::NonInteractive
    };

    let mut input = TerminalInput::stdio();
    let selection = select::select(messages, mode, &mut input, &reporter)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&selection)?);
    }

    match &selection {
        Selection::Message(message) => {
            if !cli.json {
                print_preview("Commit Message", message);
            }
            if cli.dry_run {
                info!("Dry run: no commit created");
            } else {
                git::create_commit(message)?;
                if !cli.json {
                    println!("Committed.");
                }
            }
        }
        Selection::Candidates(candidates) => {
            if !cli.json {
                print_candidates(candidates);
            }
            if !cli.dry_run {
                warn!(
                    "{} candidates generated and none chosen; no commit created. Run interactively or with -n 1 to commit",
                    candidates.len()
                );
            }
        }
    }

    Ok(())
}

/// PR mode: describe the commits and diff between base and from.
fn run_pr(cli: &Cli, cfg: &Config, base: &str, from_opt: Option<&str>) -> Result<()> {
    let from = match from_opt {
        Some(name) => name.to_string(),
        None => git::current_branch()?,
    };

    let items = git::collect_pr_items(base, &from)?;
    if items.is_empty() {
        println!("No commits found between {base} and {from}.");
        return Ok(());
    }
    info!("Found {} commits in {base}..{from}", items.len());

    let files = git::range_files(base, &from)?;
    let raw_diff = git::range_diff(base, &from, cfg.context_lines)?;
    let diff = match Changeset::build(&files, &raw_diff, &cfg.exclude) {
        Ok(changeset) => changeset.diff().to_string(),
        Err(e) => {
            warn!("Leaving the diff out of the PR prompt: {e}");
            String::new()
        }
    };

    let client = build_llm_client(cfg)?;
    pipeline::ensure_credential(client.as_ref())?;

    let ctx = PullRequestContext {
        base: base.to_string(),
        from: from.clone(),
        items,
        diff,
        description: cfg.description.clone(),
    };

    let progress = spinner(cli.json, "Generating PR description...");
    let generated = client.describe_pull_request(&ctx, &LogReporter);
    progress.finish_and_clear();

    let description = generated
        .with_context(|| format!("failed to describe {base}...{from}"))?
        .text;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "description": description }))?
        );
    } else {
        print_preview("PR Message", &description);
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let cfg = Config::from_sources(&cli)?;

    if !git::is_repository() {
        return Err(InputError::NotARepository.into());
    }

    match &cli.command {
        Some(Command::Pr { base, from }) => run_pr(&cli, &cfg, base, from.as_deref()),
        None => run_commit(&cli, &cfg),
    }
}
