//! Debian package lookups through `aptitude` and `apt-file`.
//!
//! Both executables must be on `PATH` (or configured with an absolute path)
//! when the processor loads; otherwise loading fails and the rest of the bot
//! carries on without it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context as _, bail};
use ibex_framework::prelude::*;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

pub fn processor() -> RuleResult<Processor> {
    Processor::builder("apt")
        .feature("apt")
        .usage("(apt|aptitude|apt-get) (search|show) <term> | apt-file [search] <file>")
        .option("aptitude", "Path to the aptitude executable", json!("aptitude"))
        .option("apt_file", "Path to the apt-file executable", json!("apt-file"))
        .option("timeout_secs", "Upper bound for one lookup", json!(10))
        .setup(|ctx: SetupContext| async move {
            for key in ["aptitude", "apt_file"] {
                let program = ctx.options().get_str(key).unwrap_or_default();
                if locate(program).is_none() {
                    bail!("Cannot locate {program} executable");
                }
            }
            Ok(())
        })
        .rule(on_pattern(r"^(?:apt|aptitude|apt-get)\s+search\s+(.+)$").handler(search))
        .rule(on_pattern(r"^(?:apt|aptitude|apt-get)\s+show\s+(.+)$").handler(show))
        .rule(on_pattern(r"^apt-?file\s+(?:search\s+)?(.+)$").handler(file_search))
        .build()
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

async fn search(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let output = run(&ctx, "aptitude", &["search", "-F", "%p", args.str(0)]).await?;
    ctx.add_response(package_list(&output).unwrap_or_else(|| "No packages found".to_string()));
    Ok(())
}

async fn show(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let output = run(&ctx, "aptitude", &["show", args.str(0)]).await?;
    ctx.add_response(describe(&output).unwrap_or_else(|| "No such package".to_string()));
    Ok(())
}

async fn file_search(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let output = run(&ctx, "apt_file", &["search", args.str(0)]).await?;
    ctx.add_response(file_owners(&output).unwrap_or_else(|| "No packages found".to_string()));
    Ok(())
}

/// Runs the executable configured under `key`. A non-zero exit status reads
/// as empty output, which is how both tools report "nothing found".
async fn run(ctx: &HandlerContext, key: &str, args: &[&str]) -> anyhow::Result<String> {
    let program = ctx
        .options()
        .get_str(key)
        .with_context(|| format!("option '{key}' is not set"))?;
    let timeout = Duration::from_secs(ctx.options().get::<u64>("timeout_secs").unwrap_or(10));

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();
    let output = tokio::time::timeout(timeout, child)
        .await
        .with_context(|| format!("{program} timed out"))?
        .with_context(|| format!("failed to run {program}"))?;

    if !output.status.success() {
        debug!(program = %program, status = %output.status, "Lookup found nothing");
        return Ok(String::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

/// One package per line, as printed by `aptitude search -F %p`.
pub fn package_list(output: &str) -> Option<String> {
    let packages: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    (!packages.is_empty()).then(|| packages.join(", "))
}

/// Summarises `aptitude show`: the description with its continuation lines,
/// or the providers of a virtual package.
pub fn describe(output: &str) -> Option<String> {
    let mut description: Option<String> = None;
    for line in output.lines() {
        if let Some(text) = description.as_mut() {
            if !line.starts_with([' ', '\t']) {
                break;
            }
            let line = line.trim();
            if !line.is_empty() && line != "." {
                text.push(' ');
                text.push_str(line);
            }
        } else if let Some(rest) = line.strip_prefix("Description:") {
            description = Some(format!("{}:", rest.trim()));
        } else if let Some(rest) = line.strip_prefix("Provided by:") {
            description = Some(format!("Virtual package provided by {}", rest.trim()));
        }
    }
    description
}

/// Distinct package names from `apt-file search` lines (`package: /path`).
pub fn file_owners(output: &str) -> Option<String> {
    let mut packages: Vec<&str> = Vec::new();
    for line in output.lines() {
        let package = line.split(':').next().unwrap_or_default().trim();
        if !package.is_empty() && !packages.contains(&package) {
            packages.push(package);
        }
    }
    (!packages.is_empty()).then(|| packages.join(", "))
}

/// Resolves `program` the way a shell would.
fn locate(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    let dirs = std::env::var_os("PATH")?;
    std::env::split_paths(&dirs)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
