//! Logging setup for Quire binaries.
//!
//! [`init`] installs a `tracing` subscriber that writes to stderr, filtered
//! by `RUST_LOG` or the configured default. Built with the `telemetry`
//! feature, it also exports spans over OTLP once a collector endpoint is set:
//!
//! ```bash
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 quire publish 0193
//! ```
//!
//! `QUIRE_TELEMETRY=off` keeps spans local regardless.

#[cfg(feature = "telemetry")]
mod otel;

#[cfg(feature = "telemetry")]
pub use otel::{OtelGuard, otel_layer};

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter {filter:?}: {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,

    #[error("OTLP exporter setup failed: {0}")]
    Exporter(String),
}

/// Keeps exporters alive. Hold it until the process exits.
#[derive(Default)]
pub struct TelemetryGuard {
    #[cfg(feature = "telemetry")]
    _otel: Option<OtelGuard>,
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard").finish_non_exhaustive()
    }
}

/// Collector endpoint the OTLP exporter reads.
pub const ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Set to `off` to keep spans local even with an endpoint configured.
pub const SWITCH_VAR: &str = "QUIRE_TELEMETRY";

/// Whether spans leave the process, given the two variables above.
///
/// A blank endpoint counts as unset.
pub fn export_wanted(endpoint: Option<&str>, switch: Option<&str>) -> bool {
    if switch.is_some_and(|v| v.trim().eq_ignore_ascii_case("off")) {
        return false;
    }
    endpoint.is_some_and(|e| !e.trim().is_empty())
}

fn export_requested() -> bool {
    let endpoint = std::env::var(ENDPOINT_VAR).ok();
    let switch = std::env::var(SWITCH_VAR).ok();
    export_wanted(endpoint.as_deref(), switch.as_deref())
}

/// Build the filter: `RUST_LOG` wins, then `default_filter`.
pub fn env_filter(default_filter: &str) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter).map_err(|source| TelemetryError::Filter {
            filter: default_filter.to_string(),
            source,
        }),
    }
}

/// Install the global subscriber.
pub fn init(service_name: &str, default_filter: &str) -> Result<TelemetryGuard, TelemetryError> {
    let registry = tracing_subscriber::registry()
        .with(env_filter(default_filter)?)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false));

    #[cfg(feature = "telemetry")]
    if export_requested() {
        let (layer, guard) = otel_layer(service_name)?;
        registry
            .with(layer)
            .try_init()
            .map_err(|_| TelemetryError::AlreadyInitialized)?;
        tracing::debug!(service = service_name, "OTLP export enabled");
        return Ok(TelemetryGuard { _otel: Some(guard) });
    }

    registry
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;
    tracing::trace!(service = service_name, "logging initialized");
    Ok(TelemetryGuard::default())
}
