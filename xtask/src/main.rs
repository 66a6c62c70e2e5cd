//! Development automation tasks for the `CrmSync` workspace.
//!
//! Run with: `cargo xtask <command>`
//!
//! This is a CLI tool for developers, so `println!` and `eprintln!` are
//! used for user-facing output rather than structured logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::{Command, ExitCode};

use anyhow::{anyhow, Context};

/// Crates whose documentation must build without warnings
const DOC_CRATES: [&str; 4] = ["crmsync-common", "crmsync-domain", "crmsync-core", "crmsync-infra"];

fn main() -> ExitCode {
    let task = env::args().nth(1);

    let result = match task.as_deref() {
        Some("ci") => run_ci(),
        Some("fmt") => run_fmt(),
        Some("clippy") => run_clippy(),
        Some("test") => run_test(),
        Some("doc") => run_doc(),
        Some("help") | None => {
            print_help();
            Ok(())
        }
        Some(unknown) => {
            eprintln!("Unknown task: {unknown}");
            eprintln!();
            print_help();
            Err(anyhow!("Unknown task"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Task failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("CrmSync Development Tasks");
    println!();
    println!("USAGE:");
    println!("    cargo xtask <TASK>");
    println!();
    println!("TASKS:");
    println!("    ci        Run all CI checks (fmt, clippy, test, doc)");
    println!("    fmt       Check Rust code formatting");
    println!("    clippy    Run Clippy lints");
    println!("    test      Run all tests");
    println!("    doc       Build crate documentation with warnings denied");
    println!("    help      Show this help message");
}

/// Run all CI checks in sequence
fn run_ci() -> anyhow::Result<()> {
    println!("==> Running CI checks...\n");

    println!("==> Step 1/4: Checking Rust format...");
    run_fmt()?;

    println!("\n==> Step 2/4: Running Clippy...");
    run_clippy()?;

    println!("\n==> Step 3/4: Running tests...");
    run_test()?;

    println!("\n==> Step 4/4: Building docs...");
    run_doc()?;

    println!("\n✓ All CI checks passed!");
    Ok(())
}

fn cargo(args: &[&str]) -> anyhow::Result<bool> {
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;
    Ok(status.success())
}

/// Check Rust code formatting
fn run_fmt() -> anyhow::Result<()> {
    if !cargo(&["fmt", "--all", "--", "--check"])? {
        anyhow::bail!("Format check failed. Run 'cargo fmt --all' to fix.");
    }
    Ok(())
}

/// Run Clippy lints
fn run_clippy() -> anyhow::Result<()> {
    if cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])? {
        Ok(())
    } else {
        Err(anyhow!("Clippy run failed. See output above."))
    }
}

/// Run all workspace tests
fn run_test() -> anyhow::Result<()> {
    if !cargo(&["test", "--workspace"])? {
        anyhow::bail!("Tests failed");
    }
    Ok(())
}

/// Build docs for the library crates, failing on broken intra-doc links
fn run_doc() -> anyhow::Result<()> {
    let mut args = vec!["doc", "--no-deps"];
    for krate in DOC_CRATES {
        args.extend(["-p", krate]);
    }

    let status = Command::new("cargo")
        .args(&args)
        .env("RUSTDOCFLAGS", "-D warnings")
        .status()
        .context("Failed to run cargo doc")?;

    if !status.success() {
        anyhow::bail!("Documentation build failed");
    }
    Ok(())
}
