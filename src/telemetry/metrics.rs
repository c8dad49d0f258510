//! Application metrics using the metrics crate.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Clone)]
pub struct MetricsState {
    handle: Option<PrometheusHandle>,
}

impl MetricsState {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }

        let handle = PROMETHEUS_HANDLE.get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            // A recorder may already be installed (tests); rendering still works.
            let _ = metrics::set_global_recorder(recorder);
            handle
        });

        Self {
            handle: Some(handle.clone()),
        }
    }

    pub fn disabled() -> Self {
        Self { handle: None }
    }

    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(|h| h.render())
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }
}

pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    match state.render() {
        Some(metrics) => (StatusCode::OK, metrics),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not enabled".to_string(),
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    InvalidCredentials,
    DuplicateUser,
    InvalidArgument,
    InternalError,
}

impl AuthOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            AuthOutcome::Success => "success",
            AuthOutcome::InvalidCredentials => "invalid_credentials",
            AuthOutcome::DuplicateUser => "duplicate_user",
            AuthOutcome::InvalidArgument => "invalid_argument",
            AuthOutcome::InternalError => "internal_error",
        }
    }
}

pub fn record_auth_attempt(action: &str, outcome: AuthOutcome) {
    counter!(
        "auth_attempts_total",
        "action" => action.to_string(),
        "outcome" => outcome.as_str().to_string()
    )
    .increment(1);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Public,
    Allowed,
    Unauthenticated,
    PermissionDenied,
}

impl Decision {
    fn as_str(&self) -> &'static str {
        match self {
            Decision::Public => "public",
            Decision::Allowed => "allowed",
            Decision::Unauthenticated => "unauthenticated",
            Decision::PermissionDenied => "permission_denied",
        }
    }
}

pub fn record_authorization(kind: &'static str, decision: Decision, duration: Duration) {
    counter!(
        "authorization_decisions_total",
        "kind" => kind,
        "outcome" => decision.as_str()
    )
    .increment(1);

    histogram!("authorization_duration_seconds", "kind" => kind).record(duration.as_secs_f64());
}
