//! Tracing setup for binaries that embed the coordinator

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set, `info` otherwise
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a fmt subscriber as the global default.
///
/// Returns an error if a global subscriber is already set.
pub fn try_init() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

/// Install a fmt subscriber, ignoring an already-installed one
pub fn init() {
    if let Err(e) = try_init() {
        tracing::debug!(error = %e, "Tracing already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
        assert!(try_init().is_err(), "Second install must be rejected");
    }
}
