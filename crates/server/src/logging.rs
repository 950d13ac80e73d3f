//! Tracing subscriber setup for the `devteam` binary.

use tracing_subscriber::{fmt, EnvFilter};

/// Directive used when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "info,devteam_core=debug";

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Human-readable output. Later calls are no-ops.
pub fn init(default_directive: &str) {
    fmt()
        .with_env_filter(filter(default_directive))
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

/// One JSON object per line. Later calls are no-ops.
pub fn init_json(default_directive: &str) {
    fmt()
        .json()
        .with_env_filter(filter(default_directive))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
