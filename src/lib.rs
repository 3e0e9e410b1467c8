//! Conventional commit messages and PR descriptions from staged diffs.

pub mod changeset;
pub mod cli_args;
pub mod config;
pub mod error;
pub mod exclude;
pub mod git;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod reduce;
pub mod report;
pub mod response;
pub mod select;
pub mod setup;
pub mod validate;

pub use changeset::Changeset;
pub use cli_args::{Cli, Command};
pub use error::Error;
pub use llm::{BackendKind, GenerationRequest, LlmClient};
pub use select::{Mode, Selection};
