//! Logging bootstrap.
//!
//! The library only emits `tracing` events; hosts that want them on stderr
//! call [`init_logging`] once at startup. `RUST_LOG` overrides the level.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

const SUPPORTED_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

static LOGGING_LEVEL: OnceLock<&'static str> = OnceLock::new();

/// Install a global `fmt` subscriber at `level`.
///
/// Calling again with the same level is a no-op; a different level is
/// rejected because the global subscriber cannot be replaced.
pub fn init_logging(level: &str) -> Result<(), String> {
    let normalized = normalize_level(level)?;

    if let Some(current) = LOGGING_LEVEL.get() {
        if *current == normalized {
            return Ok(());
        }
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            current, normalized
        ));
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("medkit_core={}", normalized)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| format!("failed to install subscriber: {}", e))?;

    let _ = LOGGING_LEVEL.set(normalized);
    tracing::info!(level = normalized, version = env!("CARGO_PKG_VERSION"), "core logging initialized");
    Ok(())
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    let lowered = level.trim().to_ascii_lowercase();
    SUPPORTED_LEVELS
        .iter()
        .copied()
        .find(|candidate| *candidate == lowered)
        .ok_or_else(|| format!("unsupported log level `{}`", level))
}
