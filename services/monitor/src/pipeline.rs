//! Push-to-store pipeline
//!
//! Architecture:
//! Collector → ProxyClient pushes → THIS PIPELINE → SeriesStore → log line per value

use network::{ClientError, ClientResult, ProxyClient};
use std::sync::Arc;
use std::time::Duration;
use telemetry::{DisplayValue, SeriesStore, Severity};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use types::{current_timestamp_ns, Payload, SampleBatch, TargetId};

/// Counters for one pipeline run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub batches: u64,
    pub samples: u64,
    pub invalid: u64,
    pub rejected: u64,
    pub unexpected: u64,
}

/// Feeds pushed sample batches into a series store
pub struct PushPipeline {
    store: Arc<SeriesStore>,
    stats: PipelineStats,
}

impl PushPipeline {
    pub fn new(store: Arc<SeriesStore>) -> Self {
        Self {
            store,
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Apply one push, returning the display value of every target that got a new value
    pub fn ingest(&mut self, payload: Payload) -> Vec<DisplayValue> {
        match payload {
            Payload::SamplePush(batch) => self.ingest_batch(batch),
            other => {
                self.stats.unexpected += 1;
                warn!(kind = other.kind(), "Ignoring non-sample push");
                Vec::new()
            }
        }
    }

    fn ingest_batch(&mut self, batch: SampleBatch) -> Vec<DisplayValue> {
        self.stats.batches += 1;
        let mut updated = Vec::new();

        for sample in &batch.samples {
            self.stats.samples += 1;
            if !sample.valid {
                self.stats.invalid += 1;
            }

            match self.store.add_sample(sample.target_id, sample) {
                Ok(Some(_)) => {
                    if let Some(display) = self.store.display(sample.target_id) {
                        updated.push(display);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.stats.rejected += 1;
                    warn!(target_id = sample.target_id, error = %e, "Sample rejected");
                }
            }
        }
        updated
    }

    /// Consume pushes until the channel closes
    ///
    /// The channel closes when the session tears down.
    pub async fn run(mut self, mut pushes: mpsc::Receiver<Payload>) -> PipelineStats {
        while let Some(payload) = pushes.recv().await {
            for value in self.ingest(payload) {
                log_display(&value);
            }
        }
        debug!(stats = ?self.stats, "Push channel closed");
        self.stats
    }
}

fn log_display(value: &DisplayValue) {
    let formatted = &value.formatted;
    match formatted.severity {
        Severity::Normal => info!(
            target_id = value.target_id,
            name = %value.display_name,
            value = %formatted,
            "Updated"
        ),
        severity => warn!(
            target_id = value.target_id,
            name = %value.display_name,
            value = %formatted,
            ?severity,
            "Threshold crossed"
        ),
    }
}

/// Register catalogued targets, preload recent history and subscribe
///
/// `only` restricts the targets used; empty means every enabled target.
/// History failures other than connection loss are logged and skipped.
pub async fn bootstrap(
    client: &ProxyClient,
    store: &SeriesStore,
    history: Duration,
    only: &[TargetId],
) -> ClientResult<Vec<TargetId>> {
    let targets = client.list_targets().await?;
    let since_ns = current_timestamp_ns().saturating_sub(history.as_nanos() as u64);
    let mut selected = Vec::new();

    for target in targets
        .iter()
        .filter(|t| t.enabled && (only.is_empty() || only.contains(&t.target_id)))
    {
        store.register_target(target);
        if let Some(error) = &target.last_error {
            warn!(target_id = target.target_id, error = %error, "Collector reports target error");
        }

        if !history.is_zero() {
            match client.get_history(target.target_id, since_ns, 0).await {
                Ok(batch) => {
                    store.load_history(target.target_id, &batch.samples);
                }
                Err(e) if e.is_fatal_to_connection() || e == ClientError::NotConnected => return Err(e),
                Err(e) => warn!(target_id = target.target_id, error = %e, "History unavailable"),
            }
        }
        selected.push(target.target_id);
    }

    if !selected.is_empty() {
        client.subscribe(selected.clone()).await?;
    }
    info!(
        targets = selected.len(),
        catalogued = targets.len(),
        "Monitoring targets"
    );
    Ok(selected)
}
