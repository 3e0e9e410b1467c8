use clap::{Parser, Subcommand};

use crate::llm::BackendKind;

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "commitscribe",
    version,
    about = "LLM-assisted Conventional Commit message generator"
)]
pub struct Cli {
    /// Backend to generate with
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendKind>,

    /// Model name (defaults depend on the backend)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// API key (otherwise read from the backend's environment variable)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Override the backend's base URL (e.g. a proxy or a remote Ollama host)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Maximum tokens the backend may generate
    #[arg(long, global = true)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Lines of context around each diff hunk
    #[arg(long, global = true)]
    pub context_lines: Option<u32>,

    /// Extra glob pattern to exclude from the diff (repeatable)
    #[arg(short = 'x', long = "exclude", global = true)]
    pub exclude: Vec<String>,

    /// A brief description of the change, passed to the model as context
    #[arg(short, long, global = true)]
    pub description: Option<String>,

    /// Number of alternative messages to generate
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub candidates: u8,

    /// Ask for a header plus a bullet-point body
    #[arg(long)]
    pub detailed: bool,

    /// Print the message(s) without committing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Machine-readable output (implies no interactive choice)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand (e.g. 'pr')
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands, e.g. `commitscribe pr develop`
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a Pull Request description for a branch
    Pr {
        /// Base branch to compare against (e.g. main or develop)
        base: String,

        /// Optional feature/source branch; defaults to current branch if omitted
        from: Option<String>,
    },
}

impl Cli {
    /// Whether a human may be asked to pick a candidate.
    pub fn wants_interaction(&self) -> bool {
        !(self.dry_run || self.json)
    }
}
