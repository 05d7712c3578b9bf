//! Telemetry init: installs the global `tracing` subscriber once at
//! process start. No OpenTelemetry/OTLP export — that exists to feed a metrics
//! backend, out of scope here; plain structured `tracing` output is enough.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Installs the global subscriber. Respects `RUST_LOG` via `EnvFilter`, defaulting to
/// `info` when unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .ok();
}
