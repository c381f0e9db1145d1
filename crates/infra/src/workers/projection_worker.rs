use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use templeerp_events::{EventBus, EventEnvelope, Subscription};

use crate::projections::ProjectionSet;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Envelopes seen by a worker since it started.
#[derive(Debug, Default)]
pub struct WorkerStats {
    applied: AtomicU64,
    rejected: AtomicU64,
}

impl WorkerStats {
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Envelopes at least one read model refused (gap, tenant mismatch, bad payload).
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Owns the worker thread. Dropping the handle stops the loop at its next poll.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl WorkerHandle {
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Stop the loop and wait for the thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Background consumer that keeps a [`ProjectionSet`] in step with the bus.
///
/// Delivery is at-least-once; the read models' stream cursors make replays
/// harmless. A rejected envelope is logged and counted, and the loop moves on:
/// the read models are disposable and a boot replay repairs them.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    pub fn spawn_projections<B>(bus: B, projections: Arc<ProjectionSet>) -> io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>> + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let subscription = bus.subscribe();
        let stats = Arc::new(WorkerStats::default());

        let thread_stats = stats.clone();
        let join = thread::Builder::new()
            .name("projections".to_string())
            .spawn(move || run(subscription, shutdown_rx, &projections, &thread_stats))?;

        info!("projection worker started");
        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn run(
    subscription: Subscription<EventEnvelope<JsonValue>>,
    shutdown_rx: mpsc::Receiver<()>,
    projections: &ProjectionSet,
    stats: &WorkerStats,
) {
    loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        let envelope = match subscription.recv_timeout(POLL_INTERVAL) {
            Ok(envelope) => envelope,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match projections.apply_envelope(&envelope) {
            Ok(()) => {
                stats.applied.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    tenant_id = %envelope.tenant_id(),
                    aggregate_type = envelope.aggregate_type(),
                    aggregate_id = %envelope.aggregate_id(),
                    sequence = envelope.sequence_number(),
                    occurred_at = %envelope.occurred_at(),
                    error = %err,
                    "read model update failed"
                );
            }
        }
    }

    debug!(
        applied = stats.applied(),
        rejected = stats.rejected(),
        "projection worker stopped"
    );
}
