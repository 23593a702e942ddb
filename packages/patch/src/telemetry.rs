// ABOUTME: Fire-and-forget sinks for patch application metrics
// ABOUTME: Sinks never block and never fail the synchronization path

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::metrics::PatchMetrics;

/// Receives metrics for every remote update.
///
/// Implementations must return quickly and swallow their own failures.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, metrics: &PatchMetrics);
}

/// Emits each record as a structured tracing event
#[derive(Debug, Default, Clone)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn record(&self, metrics: &PatchMetrics) {
        debug!(
            target: "crs::telemetry",
            document_id = metrics.document_id,
            mode = ?metrics.mode,
            operations = metrics.patch_operation_count,
            patch_bytes = metrics.patch_size_bytes,
            full_bytes = metrics.full_size_bytes,
            reduction_percent = metrics.size_reduction_percent,
            elapsed_ms = metrics.application_time_ms,
            success = metrics.success,
            fallback = metrics.fallback_to_full,
            "Patch application recorded"
        );
    }
}

/// Buffers records on a bounded channel for an external consumer.
///
/// When the buffer is full or the consumer is gone the record is dropped.
#[derive(Debug, Clone)]
pub struct ChannelTelemetrySink {
    sender: mpsc::Sender<PatchMetrics>,
}

impl ChannelTelemetrySink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PatchMetrics>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl TelemetrySink for ChannelTelemetrySink {
    fn record(&self, metrics: &PatchMetrics) {
        if let Err(err) = self.sender.try_send(metrics.clone()) {
            warn!(document_id = metrics.document_id, error = %err, "Dropping telemetry record");
        }
    }
}

/// Forwards each record to every inner sink
#[derive(Clone, Default)]
pub struct FanoutTelemetrySink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutTelemetrySink {
    fn record(&self, metrics: &PatchMetrics) {
        for sink in &self.sinks {
            sink.record(metrics);
        }
    }
}
