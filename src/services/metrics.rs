use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref OPERATIONS_COUNTER: CounterVec = register_counter_vec!(
        "provision_operations_total",
        "Lifecycle operations by operation and status",
        &["op", "status"]
    ).unwrap();

    pub static ref OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "provision_operation_duration_seconds",
        "Lifecycle operation duration by operation",
        &["op"]
    ).unwrap();

    pub static ref DB_STEPS_COUNTER: CounterVec = register_counter_vec!(
        "provision_db_steps_total",
        "Database provisioner steps executed or skipped because already satisfied",
        &["step", "outcome"]
    ).unwrap();
}

pub fn record_operation(op: &str, ok: bool, elapsed: Duration) {
    let status = if ok { "ok" } else { "error" };
    OPERATIONS_COUNTER.with_label_values(&[op, status]).inc();
    OPERATION_DURATION
        .with_label_values(&[op])
        .observe(elapsed.as_secs_f64());
}

pub fn record_step(step: &str, executed: bool) {
    let outcome = if executed { "executed" } else { "skipped" };
    DB_STEPS_COUNTER.with_label_values(&[step, outcome]).inc();
}

/// Renders every registered metric in the Prometheus text format.
pub fn render() -> String {
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buf) {
        tracing::warn!("failed to encode metrics: {e}");
    }
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_counter_tracks_outcome() {
        let before = DB_STEPS_COUNTER
            .with_label_values(&["test_step", "skipped"])
            .get();
        record_step("test_step", false);
        let after = DB_STEPS_COUNTER
            .with_label_values(&["test_step", "skipped"])
            .get();
        assert_eq!(after - before, 1.0);
        assert!(render().contains("provision_db_steps_total"));
    }
}
