use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref RUNS_STARTED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "scenecast_runs_started_total",
        "Total number of workflow runs started.",
        REGISTRY
    )
    .unwrap();
    pub static ref RUNS_SUCCEEDED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "scenecast_runs_succeeded_total",
        "Total number of workflow runs that produced artifacts and returned to idle.",
        REGISTRY
    )
    .unwrap();
    pub static ref RUNS_FAILED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "scenecast_runs_failed_total",
        "Total number of workflow runs that ended in the error state.",
        REGISTRY
    )
    .unwrap();
    pub static ref STATES_ENTERED_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "scenecast_states_entered_total",
        "Total number of times each workflow state was entered.",
        &["state"],
        REGISTRY
    )
    .unwrap();
    pub static ref EVENTS_IGNORED_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "scenecast_events_ignored_total",
        "Events that caused no transition, by event and reason.",
        &["event", "reason"],
        REGISTRY
    )
    .unwrap();
}

/// Force registration so every series shows up on the first scrape.
pub fn register_metrics() {
    lazy_static::initialize(&RUNS_STARTED_TOTAL);
    lazy_static::initialize(&RUNS_SUCCEEDED_TOTAL);
    lazy_static::initialize(&RUNS_FAILED_TOTAL);
    lazy_static::initialize(&STATES_ENTERED_TOTAL);
    lazy_static::initialize(&EVENTS_IGNORED_TOTAL);
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("Metrics are not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_series_are_exposed() {
        register_metrics();
        STATES_ENTERED_TOTAL.with_label_values(&["idle"]).inc();
        let text = gather_metrics().unwrap();
        assert!(text.contains("scenecast_runs_started_total"));
        assert!(text.contains("scenecast_states_entered_total{state=\"idle\"}"));
    }
}
