use std::env;
use std::fs::OpenOptions;
use std::io::Write;

use chrono::Local;

/// Whether verbose scheduler logging is enabled (SERIATE_LOG=debug|verbose).
fn is_verbose() -> bool {
    env::var("SERIATE_LOG")
        .map(|v| {
            let v = v.to_lowercase();
            v == "debug" || v == "verbose" || v == "1"
        })
        .unwrap_or(false)
}

fn write_to_log_file(line: &str) {
    let Ok(path) = env::var("SERIATE_LOG_FILE") else {
        return;
    };
    if path.is_empty() {
        return;
    }
    // Append-only; no read-back.
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) {
        let _ = writeln!(file, "{}", line);
    }
}

/// Timestamped diagnostic line on stderr when verbose logging is on.
/// Always appended to SERIATE_LOG_FILE when that is set. Never writes to
/// stdout: stdout belongs to the ordered output stream.
pub fn log(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let line = format!("[{}] {}", timestamp, message);

    if is_verbose() {
        eprintln!("{}", line);
    }

    write_to_log_file(&line);
}

/// Error line: always printed to stderr, and logged like `log`.
pub fn log_error(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let line = format!("[{}] {}", timestamp, message);

    eprintln!("{}", line);
    write_to_log_file(&line);
}
