use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or empty.
const DEFAULT_DIRECTIVE: &str = "authwatch=info";

/// Installs the global `tracing` subscriber.
///
/// A non-empty `RUST_LOG` replaces the default `authwatch=info` filter
/// entirely.
pub fn init() -> anyhow::Result<()> {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref())?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

fn build_filter(rust_log: Option<&str>) -> anyhow::Result<EnvFilter> {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG '{directives}': {e}")),
        None => Ok(EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}
