//! logging — opt-in `tracing` subscriber for binaries and tests.
//!
//! The library only emits events. Callers that want them printed call
//! [`init_tracing`] once; the filter is read from `RUST_LOG` and defaults to
//! `info`.
use tracing_subscriber::{EnvFilter, fmt};

/// Install a formatting subscriber with an `RUST_LOG` env filter.
///
/// Returns `false` if a global subscriber was already installed, so repeated
/// calls are harmless.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).try_init().is_ok()
}
