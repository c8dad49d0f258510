//! Observability: tracing, metrics, and OpenTelemetry integration.

pub mod metrics;
pub mod tracing;

pub use metrics::{record_auth_attempt, record_authorization, AuthOutcome, Decision, MetricsState};
pub use tracing::{init_telemetry, shutdown_telemetry};
