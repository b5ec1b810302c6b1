//! Structured logging setup (`spec.md` §6 "optional `DEBUG_*` flags enabling
//! namespaced tracing"), grounded in the sibling agent-service crates'
//! `tracing` + `tracing_subscriber::EnvFilter` convention rather than the
//! teacher's (logging-free) baseline.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading its filter from `RUST_LOG`,
/// falling back to `info` for this crate and `warn` elsewhere.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,agentic_e2e_runner=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
