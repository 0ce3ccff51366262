//! `tracing` subscriber setup.
//!
//! Filter precedence, highest first:
//!
//! 1. `RUST_LOG`
//! 2. `--log-level` / `RMAC_LOG`
//! 3. `log_level` from the config file
//! 4. `info`

use tracing_subscriber::EnvFilter;

const FALLBACK_DIRECTIVE: &str = "info";

/// Picks the filter directive according to the precedence above.
pub fn filter_directive(rust_log: Option<String>, cli: Option<&str>, config: &str) -> String {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .or_else(|| cli.map(str::to_string))
        .or_else(|| Some(config.trim()).filter(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_DIRECTIVE.to_string())
}

/// Builds the filter, falling back to `info` if the directive is invalid.
pub fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE))
}

/// Installs the global fmt subscriber.  Call once, early in `main`.
pub fn init(cli_level: Option<&str>, config_level: &str) {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), cli_level, config_level);
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(&directive))
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        let d = filter_directive(Some("trace".into()), Some("warn"), "debug");
        assert_eq!(d, "trace");
    }

    #[test]
    fn test_cli_beats_config() {
        let d = filter_directive(None, Some("warn"), "debug");
        assert_eq!(d, "warn");
    }

    #[test]
    fn test_config_used_when_nothing_else_set() {
        assert_eq!(filter_directive(None, None, "debug"), "debug");
    }

    #[test]
    fn test_blank_rust_log_is_ignored() {
        assert_eq!(filter_directive(Some("  ".into()), None, "error"), "error");
    }

    #[test]
    fn test_blank_config_level_means_info() {
        assert_eq!(filter_directive(None, None, " "), "info");
    }

    #[test]
    fn test_invalid_directive_falls_back() {
        // Must not panic.
        let _filter = build_filter("=== not a filter ===");
    }
}
