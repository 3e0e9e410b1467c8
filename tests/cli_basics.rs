use assert_cmd::cargo; // handy crate for testing CLIs
use predicates::prelude::*;

/// A command isolated from the developer's config file and environment.
fn isolated(dir: &tempfile::TempDir) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!();
    cmd.current_dir(dir.path())
        .env("COMMITSCRIBE_CONFIG", dir.path().join("missing.toml"))
        .env(
            "GIT_CEILING_DIRECTORIES",
            dir.path().parent().unwrap_or(dir.path()),
        )
        .env_remove("COMMITSCRIBE_BACKEND")
        .env_remove("COMMITSCRIBE_MODEL")
        .env_remove("COMMITSCRIBE_MAX_TOKENS")
        .env_remove("COMMITSCRIBE_TEMPERATURE");
    cmd
}

#[test]
fn prints_help() {
    let mut cmd = cargo::cargo_bin_cmd!();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("--candidates"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn prints_version() {
    let mut cmd = cargo::cargo_bin_cmd!();

    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn pr_help_mentions_base_branch() {
    let mut cmd = cargo::cargo_bin_cmd!();

    cmd.args(["pr", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<BASE>"));
}

#[test]
fn rejects_out_of_range_candidate_count() {
    let mut cmd = cargo::cargo_bin_cmd!();

    cmd.args(["-n", "6"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--candidates"));
}

#[test]
fn rejects_unknown_backend() {
    let mut cmd = cargo::cargo_bin_cmd!();

    cmd.args(["--backend", "bard"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("openai"));
}

#[test]
fn out_of_range_temperature_fails_before_git() {
    let dir = tempfile::tempdir().unwrap();

    isolated(&dir)
        .env("COMMITSCRIBE_TEMPERATURE", "5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("temperature must be between"));
}

#[test]
fn outside_a_repository_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();

    isolated(&dir)
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not inside a git repository"));
}
