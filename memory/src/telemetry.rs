use metrics::{counter, gauge, histogram};

/// Metric sink for the memory store.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryTelemetry;

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self
    }

    pub fn record_operation_success(&self, operation: &str, duration_ms: f64) {
        let counter_labels = [
            ("operation", operation.to_string()),
            ("status", "success".to_string())
        ];
        counter!("memory_operations_total", &counter_labels).increment(1);

        histogram!("memory_operation_duration_seconds", "operation" => operation.to_string())
            .record(duration_ms / 1000.0);
    }

    pub fn record_operation_failure(&self, operation: &str, error: &str) {
        let counter_labels = [
            ("operation", operation.to_string()),
            ("status", "failure".to_string())
        ];
        counter!("memory_operations_total", &counter_labels).increment(1);

        let error_labels = [
            ("operation", operation.to_string()),
            ("error_type", error.to_string())
        ];
        counter!("memory_operation_errors_total", &error_labels).increment(1);
    }

    pub fn record_search_results(&self, returned: usize) {
        histogram!("memory_search_results").record(returned as f64);
    }

    pub fn record_store_size(&self, size: usize) {
        gauge!("memory_records").set(size as f64);
    }

    pub fn record_corrupt_entry(&self) {
        counter!("memory_corrupt_entries_total").increment(1);
    }
}
