//! Optional config from .seriaterc or ~/.seriaterc (JSON). Merged with env
//! and CLI flags; CLI and env override the file.

use std::env;
use std::path::Path;

/// Hard cap on any configured budget.
pub const MAX_IN_FLIGHT_CAP: usize = 512;

const DEFAULT_MIN: usize = 4;

/// Default in-flight budget: SERIATE_MAX_IN_FLIGHT if set, otherwise twice
/// the CPU count, clamped to a sane range.
pub fn max_in_flight_from_env() -> usize {
    env::var("SERIATE_MAX_IN_FLIGHT")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .map(|n| n.clamp(1, MAX_IN_FLIGHT_CAP))
        .unwrap_or_else(|| (num_cpus::get() * 2).clamp(DEFAULT_MIN, MAX_IN_FLIGHT_CAP))
}

/// Optional config from file. CLI and env override these.
#[derive(Default, Debug)]
pub struct Config {
    pub max_in_flight: Option<usize>,
    pub adaptive: Option<bool>,
    pub quiet: Option<bool>,
}

/// Load config from .seriaterc in dir, then ~/.seriaterc. Missing or invalid
/// file = default.
pub fn load_config(dir: &Path) -> Config {
    let mut cfg = Config::default();
    let home = dirs_home();
    let candidates = [
        dir.join(".seriaterc"),
        home.map(|h| h.join(".seriaterc"))
            .unwrap_or_else(|| dir.join(".none")),
    ];
    for path in &candidates {
        if path.is_file() {
            if let Ok(s) = std::fs::read_to_string(path) {
                if let Ok(v) = serde_json::from_str::<serde_json::Value>(&s) {
                    if let Some(n) = v.get("maxInFlight").and_then(|x| x.as_u64()) {
                        cfg.max_in_flight = Some((n as usize).clamp(1, MAX_IN_FLIGHT_CAP));
                    }
                    if let Some(a) = v.get("adaptive").and_then(|x| x.as_bool()) {
                        cfg.adaptive = Some(a);
                    }
                    if let Some(q) = v.get("quiet").and_then(|x| x.as_bool()) {
                        cfg.quiet = Some(q);
                    }
                }
            }
            break;
        }
    }
    cfg
}

fn dirs_home() -> Option<std::path::PathBuf> {
    #[cfg(unix)]
    {
        env::var("HOME").ok().map(std::path::PathBuf::from)
    }
    #[cfg(windows)]
    {
        env::var("USERPROFILE").ok().map(std::path::PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(dir.path());
        assert!(cfg.max_in_flight.is_none());
        assert!(cfg.adaptive.is_none());
    }

    #[test]
    fn test_rc_file_is_read_and_clamped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".seriaterc"),
            r#"{"maxInFlight": 9999, "adaptive": true, "quiet": false}"#,
        )
        .unwrap();

        let cfg = load_config(dir.path());
        assert_eq!(cfg.max_in_flight, Some(MAX_IN_FLIGHT_CAP));
        assert_eq!(cfg.adaptive, Some(true));
        assert_eq!(cfg.quiet, Some(false));
    }

    #[test]
    fn test_invalid_json_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".seriaterc"), "not json").unwrap();

        let cfg = load_config(dir.path());
        assert!(cfg.max_in_flight.is_none());
    }
}
