//! Capture, validate and package agent patches for benchmark submission.
//!
//! Diffs and records go to stdout; diagnostics go to stderr (`RUST_LOG`).

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use patchcap::core::scanner::scan;
use patchcap::core::submission::format_submission;
use patchcap::core::types::ContentSnapshot;
use patchcap::exit_codes;
use patchcap::io::config::{CaptureConfig, DEFAULT_CONFIG_FILE, load_config, render_config};
use patchcap::io::predictions::append_prediction;
use patchcap::io::validator::validate_structure;
use patchcap::logging;

#[derive(Parser)]
#[command(
    name = "patchcap",
    version,
    about = "Capture and validate agent patches for benchmark submission"
)]
struct Cli {
    /// Config file; a missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the working-tree diff of a repository, untracked files included.
    Capture {
        repo: PathBuf,
        /// Commit to diff against (defaults to the configured reference).
        #[arg(long)]
        reference: Option<String>,
    },
    /// Check a patch's structure and, with `--repo`, whether it applies there.
    Validate {
        /// Patch file, or `-` for stdin.
        patch: PathBuf,
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// Print diff blocks and file mentions found in an agent response, one JSON object per line.
    Scan {
        /// Response text file, or `-` for stdin.
        response: PathBuf,
    },
    /// Diff two JSON snapshots of the form `{"path": "content", ...}`.
    SnapshotDiff { before: PathBuf, after: PathBuf },
    /// Format a patch as a submission record.
    Submit {
        /// Patch file, or `-` for stdin.
        patch: PathBuf,
        #[arg(long)]
        instance_id: String,
        #[arg(long)]
        model: Option<String>,
        /// Append to this JSON Lines file instead of printing.
        #[arg(long)]
        predictions: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    match cli.command {
        Command::Capture { repo, reference } => cmd_capture(&cfg, &repo, reference.as_deref()),
        Command::Validate { patch, repo } => cmd_validate(&cfg, &patch, repo.as_deref()),
        Command::Scan { response } => cmd_scan(&response),
        Command::SnapshotDiff { before, after } => cmd_snapshot_diff(&cfg, &before, &after),
        Command::Submit {
            patch,
            instance_id,
            model,
            predictions,
        } => cmd_submit(
            &cfg,
            &patch,
            &instance_id,
            model.as_deref(),
            predictions.as_deref(),
        ),
        Command::Config => {
            print!("{}", render_config(&cfg)?);
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_capture(cfg: &CaptureConfig, repo: &Path, reference: Option<&str>) -> Result<i32> {
    let reference = reference.unwrap_or(&cfg.reference);
    let diff = cfg
        .capturer()
        .capture(repo, reference)
        .with_context(|| format!("capture {}", repo.display()))?;
    print!("{diff}");
    Ok(exit_codes::OK)
}

fn cmd_validate(cfg: &CaptureConfig, patch: &Path, repo: Option<&Path>) -> Result<i32> {
    let diff = read_input(patch)?;
    let mut code = exit_codes::OK;

    let structure = validate_structure(&diff);
    match &structure.reason {
        None => println!("structure: ok"),
        Some(reason) => {
            println!("structure: invalid: {reason}");
            code = exit_codes::REJECTED;
        }
    }

    if let Some(repo) = repo {
        let apply = cfg.validator().test_applicability(&diff, repo);
        if apply.applicable {
            println!("apply: ok: {}", apply.detail);
        } else {
            println!("apply: failed: {}", apply.detail.trim_end());
            code = exit_codes::REJECTED;
        }
    }
    Ok(code)
}

fn cmd_scan(response: &Path) -> Result<i32> {
    let text = read_input(response)?;
    for change in scan(&text) {
        println!(
            "{}",
            serde_json::to_string(&change).context("serialize file change")?
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_snapshot_diff(cfg: &CaptureConfig, before: &Path, after: &Path) -> Result<i32> {
    let before = read_snapshot(before)?;
    let after = read_snapshot(after)?;
    print!("{}", cfg.snapshot_differ().diff(&before, &after));
    Ok(exit_codes::OK)
}

fn cmd_submit(
    cfg: &CaptureConfig,
    patch: &Path,
    instance_id: &str,
    model: Option<&str>,
    predictions: Option<&Path>,
) -> Result<i32> {
    let diff = read_input(patch)?;
    let structure = validate_structure(&diff);
    if let Some(reason) = structure.reason {
        eprintln!("submit: rejected: {reason}");
        return Ok(exit_codes::REJECTED);
    }

    let record = format_submission(&diff, instance_id, Some(model.unwrap_or(&cfg.model_name)));
    match predictions {
        Some(path) => {
            append_prediction(path, &record)?;
            eprintln!("submit: appended {} to {}", instance_id, path.display());
        }
        None => println!(
            "{}",
            serde_json::to_string_pretty(&record).context("serialize submission")?
        ),
    }
    Ok(exit_codes::OK)
}

/// Read a file, or stdin when `path` is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn read_snapshot(path: &Path) -> Result<ContentSnapshot> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).with_context(|| format!("parse snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_capture_with_reference() {
        let cli = Cli::parse_from(["patchcap", "capture", "repo", "--reference", "main"]);
        match cli.command {
            Command::Capture { repo, reference } => {
                assert_eq!(repo, PathBuf::from("repo"));
                assert_eq!(reference.as_deref(), Some("main"));
            }
            _ => panic!("expected capture"),
        }
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn parse_submit_requires_instance_id() {
        assert!(Cli::try_parse_from(["patchcap", "submit", "fix.patch"]).is_err());
        let cli = Cli::parse_from([
            "patchcap",
            "submit",
            "-",
            "--instance-id",
            "repo__123",
            "--config",
            "alt.toml",
        ]);
        assert!(matches!(cli.command, Command::Submit { .. }));
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }

    #[test]
    fn snapshot_file_parses_as_path_map() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("after.json");
        fs::write(&path, r#"{"b.txt": "2\n", "a.txt": "1\n"}"#).expect("write");
        let snapshot = read_snapshot(&path).expect("read");
        assert_eq!(
            snapshot.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["a.txt", "b.txt"]
        );
    }
}
