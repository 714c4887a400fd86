//! Prometheus metrics for sync runs

use anyhow::Result;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use sync::SyncSummary;

#[derive(Clone)]
pub struct SyncMetrics {
    registry: Registry,
    runs_total: IntCounterVec,
    operations_total: IntCounterVec,
    run_duration: Histogram,
}

impl SyncMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let runs_total = IntCounterVec::new(
            Opts::new("csv_sync_runs_total", "Total number of sync runs"),
            &["status"],
        )?;

        let operations_total = IntCounterVec::new(
            Opts::new("csv_sync_operations_total", "Directory operations by outcome"),
            &["operation", "outcome"],
        )?;

        let run_duration = Histogram::with_opts(HistogramOpts::new(
            "csv_sync_run_duration_seconds",
            "Duration of completed sync runs in seconds",
        ))?;

        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(run_duration.clone()))?;

        Ok(Self {
            registry,
            runs_total,
            operations_total,
            run_duration,
        })
    }

    pub fn record_summary(&self, summary: &SyncSummary) {
        let status = if summary.dry_run { "dry_run" } else { "completed" };
        self.runs_total.with_label_values(&[status]).inc();
        self.run_duration.observe(summary.duration.as_secs_f64());

        if summary.dry_run {
            return;
        }

        let counts = [
            ("create", "success", summary.created_count),
            ("create", "failure", summary.create_attempted - summary.created_count),
            ("delete", "success", summary.deleted_count),
            ("delete", "failure", summary.delete_attempted - summary.deleted_count),
        ];
        for (operation, outcome, count) in counts {
            self.operations_total
                .with_label_values(&[operation, outcome])
                .inc_by(count as u64);
        }
    }

    pub fn record_aborted(&self) {
        self.runs_total.with_label_values(&["aborted"]).inc();
    }

    /// Render every registered metric in the text exposition format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
