//! Ambient `tracing` setup shared by both demo binaries. Kept out of the
//! matching engine's hot loop entirely (§7: logging never touches the
//! request/response path).

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` global default from `RUST_LOG`, falling
/// back to `info` when unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
