//! Thin CLI layer: parse args, styled output, and call into seriate-core.
//! Crash-proof: panic caught and reported; all errors return Result.

mod run;

use clap::{Arg, ArgAction, Command};
use colored::Colorize;
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;

// ---- UI helpers (no-op when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal() && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

#[allow(dead_code)]
fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

#[allow(dead_code)]
fn info(msg: &str) {
    if use_color() {
        println!("{}", msg.cyan());
    } else {
        println!("{}", msg);
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

/// Summary/status lines go to stderr: stdout carries the ordered output.
fn dim_err(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.dimmed());
    } else {
        eprintln!("{}", msg);
    }
}

fn run() -> Result<(), String> {
    let matches = Command::new("seriate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run a command per input line with bounded concurrency, output in input order")
        .after_help(
            "Examples:\n  ls *.flac | seriate run -j 4 -- ffprobe {}\n  seriate run --input urls.txt -- curl -sf\n  seriate run --adaptive -- gzip -k",
        )
        .subcommand(
            Command::new("run")
                .about("Run the command once per input line; stdout stays in input order")
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_parser(clap::value_parser!(usize))
                        .help("Max concurrent commands (0 = unbounded; default from config/env)"),
                )
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Read input lines from this file instead of stdin"),
                )
                .arg(
                    Arg::new("adaptive")
                        .long("adaptive")
                        .action(ArgAction::SetTrue)
                        .help("Let observed latency steer the budget of later batches"),
                )
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .action(ArgAction::SetTrue)
                        .help("No progress bar or summary, only command output"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print a machine-readable JSON run summary to stderr"),
                )
                .arg(
                    Arg::new("command")
                        .required(true)
                        .num_args(1..)
                        .last(true)
                        .help("Command template; {} is replaced by the input line"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("run", sub_m)) => {
            let opts = run::RunOptions {
                jobs: sub_m.get_one::<usize>("jobs").copied(),
                input: sub_m.get_one::<PathBuf>("input").cloned(),
                adaptive: sub_m.get_flag("adaptive"),
                json: sub_m.get_flag("json"),
                quiet: sub_m.get_flag("quiet"),
                command: sub_m
                    .get_many::<String>("command")
                    .map(|vals| vals.cloned().collect())
                    .unwrap_or_default(),
            };
            let json_out = opts.json;
            let quiet = opts.quiet;

            let summary = run::run(opts)?;

            if json_out {
                let payload = serde_json::json!({
                    "schemaVersion": "1",
                    "command": "run",
                    "status": "ok",
                    "items": summary.items,
                    "budget": summary.budget,
                    "elapsedMs": summary.elapsed_ms,
                    "metrics": summary.metrics,
                });
                eprintln!("{}", payload);
            } else if !quiet {
                dim_err(&format!(
                    "{} items in {} ms (budget {}, peak in flight {})",
                    summary.items,
                    summary.elapsed_ms,
                    summary.budget,
                    summary.metrics.peak_in_flight
                ));
            }
        }
        _ => {
            if use_color() {
                println!("{}", "seriate".bright_cyan().bold());
                dim("Bounded-concurrency runner — parallel work, serial order.");
            } else {
                println!("seriate — bounded-concurrency runner with ordered output");
            }
            dim("\nRun `seriate --help` for details.");
        }
    }

    Ok(())
}

fn main() {
    if !use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error(&e);
            1
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}
