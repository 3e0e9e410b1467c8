use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli_args::Cli;
use crate::exclude;
use crate::llm::{BackendKind, GenerationSettings};

pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_CONTEXT_LINES: u32 = 3;

const MAX_TOKENS_LIMIT: u32 = 8192;
const TEMPERATURE_LIMIT: f32 = 2.0;
const CONTEXT_LINES_LIMIT: u32 = 20;

/// Final resolved configuration for commitscribe.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend: BackendKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub context_lines: u32,
    /// Built-in, file and CLI patterns, in that order.
    pub exclude: Vec<String>,
    pub description: Option<String>,
}

/// `~/.config/commitscribe.toml`
///
/// `model` and `base_url` apply only while `backend` (default `openai`) is
/// the one selected; switching backends on the command line or through the
/// environment falls back to that backend's defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub backend: Option<BackendKind>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub context_lines: Option<u32>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl FileConfig {
    fn api_key_for(&self, backend: BackendKind) -> Option<String> {
        match backend {
            BackendKind::OpenAi => self.openai_api_key.clone(),
            BackendKind::Anthropic => self.anthropic_api_key.clone(),
            BackendKind::Gemini => self.gemini_api_key.clone(),
            BackendKind::Ollama => None,
        }
    }
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags
    ///   2. Env vars (`COMMITSCRIBE_*`, the backend's API key variable, `OLLAMA_HOST`)
    ///   3. TOML `~/.config/commitscribe.toml` (or `$COMMITSCRIBE_CONFIG`)
    ///   4. Built-in defaults
    pub fn from_sources(cli: &Cli) -> Result<Self> {
        let file_cfg = match config_path() {
            Some(path) => load_file_config(&path)?,
            None => FileConfig::default(),
        };

        let cfg = Self::resolve(cli, file_cfg, |key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Merge the sources. `env` looks up an environment variable.
    pub fn resolve(
        cli: &Cli,
        file_cfg: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let backend = match (cli.backend, env("COMMITSCRIBE_BACKEND")) {
            (Some(backend), _) => backend,
            (None, Some(raw)) => raw
                .parse::<BackendKind>()
                .map_err(|e| anyhow!("COMMITSCRIBE_BACKEND: {e}"))?,
            (None, None) => file_cfg.backend.unwrap_or(BackendKind::OpenAi),
        };

        // The file's model and base URL belong to the file's backend.
        let file_backend = file_cfg.backend.unwrap_or(BackendKind::OpenAi);
        let (file_model, file_base_url) = if file_backend == backend {
            (file_cfg.model.clone(), file_cfg.base_url.clone())
        } else {
            (None, None)
        };

        let model = cli
            .model
            .clone()
            .or_else(|| env("COMMITSCRIBE_MODEL"))
            .or(file_model)
            .unwrap_or_else(|| backend.default_model().to_string());

        let max_tokens = match (cli.max_tokens, env("COMMITSCRIBE_MAX_TOKENS")) {
            (Some(n), _) => n,
            (None, Some(raw)) => raw
                .trim()
                .parse()
                .with_context(|| format!("COMMITSCRIBE_MAX_TOKENS is not a number: {raw:?}"))?,
            (None, None) => file_cfg.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };

        let temperature = match (cli.temperature, env("COMMITSCRIBE_TEMPERATURE")) {
            (Some(t), _) => t,
            (None, Some(raw)) => raw
                .trim()
                .parse()
                .with_context(|| format!("COMMITSCRIBE_TEMPERATURE is not a number: {raw:?}"))?,
            (None, None) => file_cfg.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        };

        let api_key = cli
            .api_key
            .clone()
            .or_else(|| backend.api_key_env().and_then(&env))
            .or_else(|| file_cfg.api_key_for(backend))
            .filter(|k| !k.trim().is_empty());

        let host_env = match backend {
            BackendKind::Ollama => env("OLLAMA_HOST").map(|h| with_scheme(&h)),
            _ => None,
        };
        let base_url = cli
            .base_url
            .clone()
            .or(host_env)
            .or(file_base_url);

        let description = cli
            .description
            .clone()
            .or_else(|| file_cfg.description.clone())
            .filter(|d| !d.trim().is_empty());

        Ok(Config {
            backend,
            model,
            api_key,
            base_url,
            max_tokens,
            temperature,
            context_lines: cli
                .context_lines
                .or(file_cfg.context_lines)
                .unwrap_or(DEFAULT_CONTEXT_LINES),
            exclude: exclude::merge_patterns(&file_cfg.exclude, &cli.exclude),
            description,
        })
    }

    /// Check numeric bounds.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_TOKENS_LIMIT).contains(&self.max_tokens) {
            bail!(
                "max_tokens must be between 1 and {MAX_TOKENS_LIMIT}, got {}",
                self.max_tokens
            );
        }
        if !(0.0..=TEMPERATURE_LIMIT).contains(&self.temperature) {
            bail!(
                "temperature must be between 0.0 and {TEMPERATURE_LIMIT}, got {}",
                self.temperature
            );
        }
        if self.context_lines > CONTEXT_LINES_LIMIT {
            bail!(
                "context_lines must be at most {CONTEXT_LINES_LIMIT}, got {}",
                self.context_lines
            );
        }
        if self.model.trim().is_empty() {
            bail!("model must not be empty");
        }
        Ok(())
    }

    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// `OLLAMA_HOST` is often given as `host:port`.
fn with_scheme(host: &str) -> String {
    let host = host.trim();
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Return `$COMMITSCRIBE_CONFIG` or `~/.config/commitscribe.toml`
fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os("COMMITSCRIBE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("commitscribe.toml"))
}

/// A missing file is an empty config; an unreadable or malformed one is an error.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str::<FileConfig>(&data)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("commitscribe").chain(args.iter().copied()))
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let cfg = Config::resolve(&cli(&[]), FileConfig::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.backend, BackendKind::OpenAi);
        assert_eq!(cfg.model, BackendKind::OpenAi.default_model());
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(cfg.context_lines, DEFAULT_CONTEXT_LINES);
        assert_eq!(cfg.api_key, None);
        assert_eq!(cfg.exclude.len(), exclude::DEFAULT_PATTERNS.len());
        cfg.validate().unwrap();
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let file_cfg = FileConfig {
            model: Some("from-file".into()),
            max_tokens: Some(100),
            temperature: Some(0.1),
            ..Default::default()
        };
        let env = env_of(&[
            ("COMMITSCRIBE_MODEL", "from-env"),
            ("COMMITSCRIBE_MAX_TOKENS", "200"),
        ]);
        let cfg = Config::resolve(&cli(&["--max-tokens", "300"]), file_cfg, env).unwrap();
        assert_eq!(cfg.model, "from-env");
        assert_eq!(cfg.max_tokens, 300);
        assert_eq!(cfg.temperature, 0.1);
    }

    #[test]
    fn api_key_follows_the_selected_backend() {
        let file_cfg = FileConfig {
            anthropic_api_key: Some("sk-ant-from-file".into()),
            ..Default::default()
        };
        let env = env_of(&[
            ("COMMITSCRIBE_BACKEND", "claude"),
            ("OPENAI_API_KEY", "sk-openai"),
        ]);
        let cfg = Config::resolve(&cli(&[]), file_cfg, env).unwrap();
        assert_eq!(cfg.backend, BackendKind::Anthropic);
        assert_eq!(cfg.api_key.as_deref(), Some("sk-ant-from-file"));
        assert_eq!(cfg.model, BackendKind::Anthropic.default_model());
    }

    #[test]
    fn file_model_and_url_stay_with_the_file_backend() {
        let ollama_file = || FileConfig {
            backend: Some(BackendKind::Ollama),
            model: Some("llama3.2".into()),
            base_url: Some("http://gpu-box:11434".into()),
            ..Default::default()
        };

        let switched =
            Config::resolve(&cli(&["--backend", "openai"]), ollama_file(), env_of(&[])).unwrap();
        assert_eq!(switched.backend, BackendKind::OpenAi);
        assert_eq!(switched.model, BackendKind::OpenAi.default_model());
        assert_eq!(switched.base_url, None);

        let env = env_of(&[("COMMITSCRIBE_BACKEND", "gemini")]);
        let from_env = Config::resolve(&cli(&[]), ollama_file(), env).unwrap();
        assert_eq!(from_env.model, BackendKind::Gemini.default_model());
        assert_eq!(from_env.base_url, None);

        let same = Config::resolve(&cli(&[]), ollama_file(), env_of(&[])).unwrap();
        assert_eq!(same.backend, BackendKind::Ollama);
        assert_eq!(same.model, "llama3.2");
        assert_eq!(same.base_url.as_deref(), Some("http://gpu-box:11434"));
    }

    #[test]
    fn ollama_host_gets_a_scheme() {
        let env = env_of(&[("OLLAMA_HOST", "10.0.0.5:11434")]);
        let cfg = Config::resolve(&cli(&["--backend", "ollama"]), FileConfig::default(), env).unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://10.0.0.5:11434"));
        assert_eq!(cfg.api_key, None);
    }

    #[test]
    fn bad_env_values_are_errors() {
        let env = env_of(&[("COMMITSCRIBE_BACKEND", "bard")]);
        assert!(Config::resolve(&cli(&[]), FileConfig::default(), env).is_err());

        let env = env_of(&[("COMMITSCRIBE_TEMPERATURE", "warm")]);
        assert!(Config::resolve(&cli(&[]), FileConfig::default(), env).is_err());
    }

    #[test]
    fn bounds_are_enforced() {
        let base = Config::resolve(&cli(&[]), FileConfig::default(), env_of(&[])).unwrap();

        let mut cfg = base.clone();
        cfg.max_tokens = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.temperature = 2.5;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.context_lines = 21;
        assert!(cfg.validate().is_err());

        let mut cfg = base;
        cfg.temperature = 2.0;
        cfg.max_tokens = 8192;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn exclusions_concatenate_file_then_cli() {
        let file_cfg = FileConfig {
            exclude: vec!["*.snap".into()],
            ..Default::default()
        };
        let cfg = Config::resolve(&cli(&["-x", "docs/**"]), file_cfg, env_of(&[])).unwrap();
        let tail: Vec<_> = cfg.exclude.iter().rev().take(2).rev().cloned().collect();
        assert_eq!(tail, vec!["*.snap", "docs/**"]);
    }

    #[test]
    fn toml_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commitscribe.toml");
        fs::write(
            &path,
            "backend = \"gemini\"\nmax_tokens = 256\nexclude = [\"*.pb.go\"]\ngemini_api_key = \"abc\"\n",
        )
        .unwrap();

        let file_cfg = load_file_config(&path).unwrap();
        assert_eq!(file_cfg.backend, Some(BackendKind::Gemini));
        assert_eq!(file_cfg.max_tokens, Some(256));
        assert_eq!(file_cfg.exclude, vec!["*.pb.go"]);
    }

    #[test]
    fn missing_file_is_empty_and_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_file_config(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(missing.model, None);

        let path = dir.path().join("bad.toml");
        fs::write(&path, "max_tokens = \"lots\"").unwrap();
        assert!(load_file_config(&path).is_err());
    }
}
