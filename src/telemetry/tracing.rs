//! Subscriber setup: level filter, console output and optional OTLP export.
//!
//! `RUST_LOG` replaces the configured level entirely. Without it, the
//! transport crates under the gRPC server are held at `warn` so per-frame
//! chatter does not drown the call logs.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, Environment, LogFormat, TelemetryConfig};

const TRANSPORT_DIRECTIVES: &[&str] =
    &["h2=warn", "hyper=warn", "tower=warn", "tonic::transport=warn"];

pub fn init_telemetry(config: &Config) {
    let filter = level_filter(&config.logging.level);

    let (tracer, export_error) =
        match create_otel_tracer(&config.telemetry, &config.server.environment) {
            Ok(tracer) => (tracer, None),
            Err(e) => (None, Some(e)),
        };
    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let registry = tracing_subscriber::registry().with(filter).with(otel_layer);

    match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
    }

    // The subscriber only exists now, so a failed exporter is reported late.
    if let Some(e) = export_error {
        tracing::warn!(error = %e, "OTLP exporter unavailable, spans stay local");
    }
}

fn level_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    TRANSPORT_DIRECTIVES
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(EnvFilter::new(level), EnvFilter::add_directive)
}

fn otel_resource(config: &TelemetryConfig, environment: &Environment) -> Resource {
    Resource::new([
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("deployment.environment", environment.as_str()),
    ])
}

/// `Ok(None)` when no endpoint is configured.
fn create_otel_tracer(
    config: &TelemetryConfig,
    environment: &Environment,
) -> Result<Option<sdktrace::Tracer>, opentelemetry::trace::TraceError> {
    let Some(endpoint) = config.otlp_endpoint.as_ref() else {
        return Ok(None);
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = sdktrace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(otel_resource(config, environment))
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);

    Ok(Some(tracer))
}

pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
