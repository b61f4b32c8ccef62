//! CLI binary integration tests.
//!
//! These tests run the compiled `vaultkeep` binary against a throwaway home
//! directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Locate the compiled `vaultkeep` binary in the workspace target directory.
fn vaultkeep_bin() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    // tests/integration -> workspace root
    let workspace_root = manifest_dir
        .parent()
        .expect("tests/ parent")
        .parent()
        .expect("workspace root");
    let bin = workspace_root.join("target").join("debug").join("vaultkeep");
    assert!(
        bin.exists(),
        "vaultkeep binary not found at {}; run `cargo build -p vaultkeep-cli` first",
        bin.display()
    );
    bin
}

fn vaultkeep_cmd(home: &Path, password: &str) -> Command {
    let mut cmd = Command::new(vaultkeep_bin());
    cmd.env_remove("VAULTKEEP_CONFIG")
        .env_remove("VAULTKEEP_STORE")
        .env_remove("VAULTKEEP_LOG")
        .env("VAULTKEEP_HOME", home)
        .env("VAULTKEEP_USER", "alice")
        .env("VAULTKEEP_MASTER_PASSWORD", password)
        .env("VAULTKEEP_KDF_ITERATIONS", "100000");
    cmd
}

fn run(home: &Path, password: &str, args: &[&str]) -> Output {
    vaultkeep_cmd(home, password)
        .args(args)
        .output()
        .expect("failed to run vaultkeep")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), "pw", &["version"]);
    assert!(output.status.success(), "version command should succeed");
    assert!(stdout(&output).contains("vaultkeep"));
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), "pw", &["--help"]);
    assert!(output.status.success(), "--help should succeed");
    let text = stdout(&output);
    for command in ["add", "audit", "export", "import"] {
        assert!(text.contains(command), "help should mention '{command}', got: {text}");
    }
}

#[test]
fn test_cli_unknown_command() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), "pw", &["nonexistent-command"]);
    assert!(!output.status.success(), "unknown command should return non-zero exit code");
}

#[test]
fn test_cli_config_validate() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), "pw", &["config", "validate"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("valid"));
}

#[test]
fn test_cli_vault_workflow() {
    let home = TempDir::new().unwrap();
    let home = home.path();
    let password = "correct horse battery staple";

    let output = run(home, password, &["init"]);
    assert!(output.status.success(), "init failed: {:?}", output);
    assert!(home.join("vault.json").exists());

    let output = run(
        home,
        password,
        &["add", "GitHub", "--username", "octocat", "--password", "s3cret-Pass!"],
    );
    assert!(output.status.success(), "add failed: {:?}", output);

    let stored = std::fs::read_to_string(home.join("vault.json")).unwrap();
    assert!(!stored.contains("octocat"));
    assert!(!stored.contains("s3cret-Pass!"));

    let output = run(home, password, &["list", "--json"]);
    assert!(output.status.success());
    let items: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(items[0]["name"], "GitHub");

    let output = run(home, password, &["show", "github"]);
    assert!(!stdout(&output).contains("s3cret-Pass!"));
    let output = run(home, password, &["show", "github", "--reveal"]);
    assert!(stdout(&output).contains("s3cret-Pass!"));

    let output = run(home, password, &["search", "OctoCat", "--exact", "username"]);
    assert!(stdout(&output).contains("GitHub"));

    let output = run(home, password, &["export", "--output", "-"]);
    assert!(output.status.success());
    let export: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(export["metadata"]["item_count"], 1);

    let output = run(home, "wrong password", &["list"]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("could not be decrypted"));

    let output = run(home, password, &["delete", "GitHub"]);
    assert!(output.status.success());
    let output = run(home, password, &["list", "--json"]);
    let items: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(items.as_array().map(Vec::len), Some(0));
}
