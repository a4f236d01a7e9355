//! The progress publisher (C6): turns a batch's raw counters into a
//! debounced, smoothed progress event and fans it out both to in-process
//! subscribers (grounded on `events::channel`'s crossbeam-channel wrapper)
//! and to the catalog's best-effort `publish` for out-of-process readers.
//!
//! Debounce policy (spec.md §4.9): at most one emission per 250ms per job,
//! except a batch reaching a terminal state always emits regardless of the
//! debounce window. Throughput is an EWMA with alpha 0.2 so a few slow
//! batches don't make the ETA swing wildly.

use crate::catalog::CatalogGateway;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(250);
const EWMA_ALPHA: f64 = 0.2;
const RING_BUFFER_CAPACITY: usize = 256;

/// A point-in-time progress snapshot for one job, as published to
/// subscribers and the catalog's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: String,
    pub batches_total: usize,
    pub batches_completed: usize,
    pub batches_failed: usize,
    pub items_processed: usize,
    pub items_total: usize,
    /// Items/sec, EWMA-smoothed across emissions. `None` until at least
    /// two snapshots have been recorded for this job.
    pub throughput_per_sec: Option<f64>,
    /// Estimated seconds to completion at the current smoothed throughput.
    pub eta_seconds: Option<f64>,
}

struct JobTrackState {
    last_emitted_at: Option<Instant>,
    last_processed: usize,
    last_processed_at: Instant,
    throughput_ewma: Option<f64>,
    ring: VecDeque<JobProgress>,
}

impl JobTrackState {
    fn new() -> Self {
        Self {
            last_emitted_at: None,
            last_processed: 0,
            last_processed_at: Instant::now(),
            throughput_ewma: None,
            ring: VecDeque::with_capacity(RING_BUFFER_CAPACITY),
        }
    }
}

/// Debounced, smoothed progress fan-out for one controller's running jobs.
pub struct ProgressPublisher {
    sender: Sender<JobProgress>,
    receiver: Receiver<JobProgress>,
    state: Mutex<HashMap<String, JobTrackState>>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver, state: Mutex::new(HashMap::new()) }
    }

    /// Subscribe to every emitted (post-debounce) progress event across all
    /// jobs this publisher tracks.
    pub fn subscribe(&self) -> Receiver<JobProgress> {
        self.receiver.clone()
    }

    /// Report a fresh batch-count/item-count snapshot for `job_id`. `force`
    /// bypasses the debounce window — callers set it when a batch just
    /// reached a terminal state (spec.md §4.9 "at least one emission per
    /// batch completion").
    pub fn report(
        &self,
        catalog: &dyn CatalogGateway,
        job_id: &str,
        batches_total: usize,
        batches_completed: usize,
        batches_failed: usize,
        items_processed: usize,
        items_total: usize,
        force: bool,
    ) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let track = guard.entry(job_id.to_string()).or_insert_with(JobTrackState::new);

        let now = Instant::now();
        let should_emit = force || track.last_emitted_at.map(|t| now.duration_since(t) >= DEBOUNCE_INTERVAL).unwrap_or(true);
        if !should_emit {
            return;
        }

        let elapsed = now.duration_since(track.last_processed_at).as_secs_f64();
        let delta_items = items_processed.saturating_sub(track.last_processed) as f64;
        if elapsed > 0.0 {
            let instantaneous = delta_items / elapsed;
            track.throughput_ewma = Some(match track.throughput_ewma {
                Some(prev) => EWMA_ALPHA * instantaneous + (1.0 - EWMA_ALPHA) * prev,
                None => instantaneous,
            });
        }
        track.last_processed = items_processed;
        track.last_processed_at = now;
        track.last_emitted_at = Some(now);

        let eta_seconds = track.throughput_ewma.filter(|t| *t > 0.0).map(|throughput| {
            let remaining = items_total.saturating_sub(items_processed) as f64;
            remaining / throughput
        });

        let snapshot = JobProgress {
            job_id: job_id.to_string(),
            batches_total,
            batches_completed,
            batches_failed,
            items_processed,
            items_total,
            throughput_per_sec: track.throughput_ewma,
            eta_seconds,
        };

        if track.ring.len() == RING_BUFFER_CAPACITY {
            track.ring.pop_front();
        }
        track.ring.push_back(snapshot.clone());

        let _ = self.sender.send(snapshot.clone());
        let _ = catalog.publish(&format!("job:{job_id}"), &json!(snapshot));
    }

    /// The most recent snapshots retained for `job_id`, oldest first.
    pub fn history(&self, job_id: &str) -> Vec<JobProgress> {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(job_id).map(|t| t.ring.iter().cloned().collect()).unwrap_or_default()
    }

    /// Drop tracking state for a job once it reaches a terminal status.
    pub fn forget(&self, job_id: &str) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.remove(job_id);
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sqlite::SqliteCatalog;

    #[test]
    fn debounces_rapid_reports() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let publisher = ProgressPublisher::new();
        let subscriber = publisher.subscribe();

        publisher.report(&catalog, "j1", 4, 0, 0, 0, 100, false);
        publisher.report(&catalog, "j1", 4, 0, 0, 10, 100, false);
        publisher.report(&catalog, "j1", 4, 0, 0, 20, 100, false);

        // Only the first report should have emitted (the rest land inside
        // the 250ms debounce window).
        assert!(subscriber.try_recv().is_ok());
        assert!(subscriber.try_recv().is_err());
    }

    #[test]
    fn forced_emission_bypasses_debounce() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let publisher = ProgressPublisher::new();
        let subscriber = publisher.subscribe();

        publisher.report(&catalog, "j1", 4, 0, 0, 0, 100, false);
        publisher.report(&catalog, "j1", 4, 1, 0, 25, 100, true);

        assert!(subscriber.try_recv().is_ok());
        assert!(subscriber.try_recv().is_ok());
    }

    #[test]
    fn ring_buffer_caps_history() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let publisher = ProgressPublisher::new();

        for i in 0..300 {
            publisher.report(&catalog, "j1", 1, 0, 0, i, 300, true);
        }

        assert_eq!(publisher.history("j1").len(), RING_BUFFER_CAPACITY);
    }

    #[test]
    fn forget_clears_tracking_state() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let publisher = ProgressPublisher::new();
        publisher.report(&catalog, "j1", 1, 1, 0, 10, 10, true);
        assert!(!publisher.history("j1").is_empty());

        publisher.forget("j1");
        assert!(publisher.history("j1").is_empty());
    }
}
