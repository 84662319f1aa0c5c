//! Observability: structured logging and Prometheus metrics.

pub mod metrics;
pub mod tracing;

pub use metrics::{
    record_audit_entry, record_auth_attempt, record_permission_check, record_reservation_change,
    AuthOutcome, MetricsState,
};
pub use tracing::init_telemetry;
