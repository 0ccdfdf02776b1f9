use metrics::{describe_counter, describe_gauge, Unit};

/// Adds description/help text to the metrics emitted by the kill-service
/// core, so the Prometheus exporter doesn't ship bare, undocumented names.
pub(crate) fn install_metrics() {
    describe_gauge!(
        "kill_service.pending_total",
        Unit::Count,
        "Instances awaiting a dispatch pass"
    );
    describe_gauge!(
        "kill_service.inflight_total",
        Unit::Count,
        "Instances with an outstanding kill issuance"
    );
    describe_counter!(
        "kill_service.kills_issued_total",
        Unit::Count,
        "Total driver kill_task calls issued"
    );
    describe_counter!(
        "kill_service.force_expunges_total",
        Unit::Count,
        "Total force_expunge calls issued"
    );
    describe_counter!(
        "kill_service.retries_total",
        Unit::Count,
        "Total in-flight entries re-issued by the retry timer"
    );
    describe_counter!(
        "kill_service.terminal_events_total",
        Unit::Count,
        "Total terminal events that cleared a tracked instance"
    );
}
