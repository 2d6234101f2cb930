//! Prometheus metrics for the spreadwatch console.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. Registration only
//! fails on duplicate metric names, which is a build defect that should
//! crash at first use rather than silently drop metrics.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_int_gauge, CounterVec,
    Encoder, Gauge, GaugeVec, IntGauge, TextEncoder,
};

/// Push channel connection state (1 = connected, 0 = disconnected).
pub static PUSH_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "spreadwatch_push_connected",
        "Push channel connection state (1=connected)"
    )
    .unwrap()
});

/// Push channel disconnects.
/// Labels: reason (lost/exhausted)
pub static PUSH_DISCONNECTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spreadwatch_push_disconnects_total",
        "Push channel disconnects by reason",
        &["reason"]
    )
    .unwrap()
});

/// Push events handled.
/// Labels: event (strategy_update/malformed/error)
pub static PUSH_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spreadwatch_push_events_total",
        "Push channel events handled",
        &["event"]
    )
    .unwrap()
});

/// Operator commands.
/// Labels: command (initialize/start/stop), outcome (success/failure/rejected)
pub static COMMANDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spreadwatch_commands_total",
        "Operator commands by outcome",
        &["command", "outcome"]
    )
    .unwrap()
});

/// Alerts shown to the operator.
pub static ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spreadwatch_alerts_total",
        "Operator alerts by severity",
        &["severity"]
    )
    .unwrap()
});

/// Poll results discarded because a newer write already landed.
pub static STALE_POLL_DROPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spreadwatch_stale_poll_drops_total",
        "Status poll field groups dropped as stale",
        &["group"]
    )
    .unwrap()
});

/// Entries currently held by the signal log.
pub static LOG_BUFFER_LEN: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "spreadwatch_log_buffer_len",
        "Entries currently held by the signal log"
    )
    .unwrap()
});

/// Believed remote run state (1 = active).
pub static RUN_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "spreadwatch_run_state",
        "Believed remote run state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

const RUN_STATES: [&str; 8] = [
    "uninitialized",
    "initializing",
    "initialized",
    "starting",
    "running",
    "stopping",
    "stopped",
    "faulted",
];

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn push_connected() {
        PUSH_CONNECTED.set(1.0);
    }

    pub fn push_disconnected(reason: &str) {
        PUSH_CONNECTED.set(0.0);
        PUSH_DISCONNECTS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn push_event(event: &str) {
        PUSH_EVENTS_TOTAL.with_label_values(&[event]).inc();
    }

    pub fn command(command: &str, outcome: &str) {
        COMMANDS_TOTAL.with_label_values(&[command, outcome]).inc();
    }

    pub fn alert(severity: &str) {
        ALERTS_TOTAL.with_label_values(&[severity]).inc();
    }

    pub fn stale_poll_dropped(group: &str) {
        STALE_POLL_DROPS_TOTAL.with_label_values(&[group]).inc();
    }

    pub fn log_buffer_len(len: usize) {
        LOG_BUFFER_LEN.set(len as i64);
    }

    /// Only the active state is set to 1.
    pub fn run_state_set(state: &str) {
        for s in RUN_STATES {
            RUN_STATE.with_label_values(&[s]).set(0.0);
        }
        RUN_STATE.with_label_values(&[state]).set(1.0);
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_single_active() {
        Metrics::run_state_set("running");
        Metrics::run_state_set("stopped");
        assert_eq!(RUN_STATE.with_label_values(&["running"]).get(), 0.0);
        assert_eq!(RUN_STATE.with_label_values(&["stopped"]).get(), 1.0);
    }

    #[test]
    fn test_encode_contains_metrics() {
        Metrics::command("start", "rejected");
        let text = Metrics::encode_text().unwrap();
        assert!(text.contains("spreadwatch_commands_total"));
    }
}
