//! `run` command: map input lines through a subprocess command with bounded
//! concurrency, streaming each command's stdout strictly in input order.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indicatif::ProgressBar;
use seriate_core::{Batch, BatchConfig, BudgetConfig, MetricsSnapshot};

pub struct RunOptions {
    /// Max concurrent commands; None = config/env default, Some(0) = unbounded.
    pub jobs: Option<usize>,
    pub input: Option<PathBuf>,
    pub adaptive: bool,
    pub json: bool,
    pub quiet: bool,
    /// Command template; `{}` in any argument is replaced by the input line,
    /// otherwise the line is appended as the last argument.
    pub command: Vec<String>,
}

pub struct RunSummary {
    pub items: usize,
    pub budget: usize,
    pub elapsed_ms: u64,
    pub metrics: MetricsSnapshot,
}

fn read_inputs(input: &Option<PathBuf>) -> Result<Vec<String>, String> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?,
        None => {
            let mut lines = Vec::new();
            for line in std::io::stdin().lock().lines() {
                lines.push(line.map_err(|e| format!("Failed to read stdin: {}", e))?);
            }
            return Ok(lines.into_iter().filter(|l| !l.trim().is_empty()).collect());
        }
    };
    Ok(raw
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect())
}

/// Substitute `line` into the template: every `{}` occurrence, or appended
/// last when the template has no placeholder.
fn build_argv(template: &[String], line: &str) -> Vec<String> {
    let mut argv: Vec<String> = Vec::with_capacity(template.len() + 1);
    let mut substituted = false;
    for arg in template {
        if arg.contains("{}") {
            argv.push(arg.replace("{}", line));
            substituted = true;
        } else {
            argv.push(arg.clone());
        }
    }
    if !substituted {
        argv.push(line.to_string());
    }
    argv
}

async fn run_one(argv: Vec<String>) -> Result<Vec<u8>, String> {
    let output = tokio::process::Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| format!("Failed to spawn {}: {}", argv[0], e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{} exited with {} {}",
            argv[0],
            output.status,
            stderr.trim()
        ));
    }

    Ok(output.stdout)
}

pub fn run(opts: RunOptions) -> Result<RunSummary, String> {
    if opts.command.is_empty() {
        return Err("No command given; pass one after `--`.".to_string());
    }

    let file_cfg = seriate_core::load_config(Path::new("."));
    let budget = opts
        .jobs
        .or(file_cfg.max_in_flight)
        .unwrap_or_else(seriate_core::max_in_flight_from_env);
    let adaptive = opts.adaptive || file_cfg.adaptive.unwrap_or(false);
    let quiet = opts.quiet || file_cfg.quiet.unwrap_or(false);

    let items = read_inputs(&opts.input)?;
    let total = items.len();

    let batch = if adaptive {
        Batch::adaptive(BatchConfig::bounded(budget), BudgetConfig::default())
    } else {
        Batch::new(BatchConfig::bounded(budget))
    };

    let progress = if !quiet && std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        Some(ProgressBar::new(total as u64))
    } else {
        None
    };

    let template = Arc::new(opts.command);
    let started = Instant::now();

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;

    let result = runtime.block_on(async {
        let template = Arc::clone(&template);
        let progress_c = progress.clone();

        batch
            .map_consume_in_order(
                items,
                move |line: String| {
                    let argv = build_argv(&template, &line);
                    run_one(argv)
                },
                move |stdout: Vec<u8>| {
                    let progress = progress_c.clone();
                    async move {
                        let mut out = std::io::stdout().lock();
                        out.write_all(&stdout)
                            .and_then(|_| out.flush())
                            .map_err(|e| format!("Failed to write output: {}", e))?;
                        if let Some(bar) = &progress {
                            bar.inc(1);
                        }
                        Ok(())
                    }
                },
            )
            .await
    });

    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    result.map_err(|e| e.to_string())?;

    Ok(RunSummary {
        items: total,
        budget,
        elapsed_ms: started.elapsed().as_millis() as u64,
        metrics: batch.metrics().snapshot(),
    })
}
