//! Runtime metrics.
//!
//! # Metrics
//! - `service_runtime_task_failures_total` (counter): failed or panicked tasks, by phase
//! - `service_runtime_signals_total` (counter): termination signals received, by signal
//! - `service_runtime_shutdown_duration_seconds` (histogram): time spent in the shutdown phase
//! - `service_runtime_shutdown_deadline_exceeded_total` (counter): shutdowns that hit the deadline

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Register descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        "service_runtime_task_failures_total",
        "Tasks that returned an error or panicked"
    );
    describe_counter!(
        "service_runtime_signals_total",
        "Termination signals received"
    );
    describe_histogram!(
        "service_runtime_shutdown_duration_seconds",
        Unit::Seconds,
        "Time spent running shutdown handlers"
    );
    describe_counter!(
        "service_runtime_shutdown_deadline_exceeded_total",
        "Shutdown phases that exceeded their deadline"
    );
}

/// Count a task or handler that failed or panicked.
pub fn record_task_failure(phase: &'static str) {
    counter!("service_runtime_task_failures_total", "phase" => phase).increment(1);
}

/// Count a termination signal.
pub fn record_signal(signal: &'static str) {
    counter!("service_runtime_signals_total", "signal" => signal).increment(1);
}

/// Record how long the shutdown phase took and whether it hit the deadline.
pub fn record_shutdown(elapsed: Duration, deadline_exceeded: bool) {
    histogram!("service_runtime_shutdown_duration_seconds").record(elapsed.as_secs_f64());
    if deadline_exceeded {
        counter!("service_runtime_shutdown_deadline_exceeded_total").increment(1);
    }
}
