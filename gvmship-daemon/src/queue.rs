//! Single-flight ship queue.
//!
//! Triggers are pushed into a bounded channel consumed by one worker task,
//! so at most one run executes at a time and at most `capacity` triggers
//! wait behind it. Runs land in the cumulative log in trigger order.
//!
//! ```text
//! HTTP trigger --try_send--> [ mpsc(capacity) ] --recv--> worker --> ShipOrchestrator::run
//!                   |
//!                   +-- full --> Rejected(Busy)
//! ```

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use gvmship_report::{ReportExporter, ShipOrchestrator};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A queued request for one ship run.
#[derive(Debug, Clone)]
pub struct ShipTrigger {
    /// Trigger identifier, logged by the worker.
    pub id: Uuid,
    /// Caller address, when triggered over HTTP.
    pub requested_by: Option<IpAddr>,
    /// When the trigger was accepted.
    pub queued_at: Instant,
}

impl ShipTrigger {
    fn new(requested_by: Option<IpAddr>) -> Self {
        Self {
            id: Uuid::new_v4(),
            requested_by,
            queued_at: Instant::now(),
        }
    }
}

/// Why a trigger was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A run is in progress and the queue is full.
    Busy,
    /// The queue has been shut down.
    Closed,
}

/// Result of [`ShipQueue::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Queued; the worker will run it.
    Accepted(Uuid),
    /// Not queued.
    Rejected(RejectReason),
}

/// Bounded single-worker queue in front of a [`ShipOrchestrator`].
pub struct ShipQueue {
    tx: mpsc::Sender<ShipTrigger>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    completed: Arc<AtomicU64>,
}

impl ShipQueue {
    /// Spawn the worker task and return the queue handle.
    ///
    /// `capacity` is the number of triggers that may wait behind the
    /// running one; values below 1 are raised to 1.
    pub fn spawn<E: ReportExporter>(orchestrator: Arc<ShipOrchestrator<E>>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let completed = Arc::new(AtomicU64::new(0));

        let worker = tokio::spawn(worker_loop(
            orchestrator,
            rx,
            shutdown_rx,
            Arc::clone(&completed),
        ));

        Self {
            tx,
            shutdown_tx,
            worker: Mutex::new(Some(worker)),
            completed,
        }
    }

    /// Queue a run without waiting.
    pub fn trigger(&self, requested_by: Option<IpAddr>) -> TriggerOutcome {
        let trigger = ShipTrigger::new(requested_by);
        let id = trigger.id;
        match self.tx.try_send(trigger) {
            Ok(()) => {
                tracing::debug!(trigger_id = %id, "ship trigger queued");
                TriggerOutcome::Accepted(id)
            }
            Err(mpsc::error::TrySendError::Full(_)) => TriggerOutcome::Rejected(RejectReason::Busy),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                TriggerOutcome::Rejected(RejectReason::Closed)
            }
        }
    }

    /// Number of triggers waiting behind the running one.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Number of runs the worker has finished, successful or not.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Stop accepting triggers and wait for queued runs to finish.
    ///
    /// Idempotent; later calls return immediately.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "ship worker terminated abnormally");
            }
        }
    }
}

async fn worker_loop<E: ReportExporter>(
    orchestrator: Arc<ShipOrchestrator<E>>,
    mut rx: mpsc::Receiver<ShipTrigger>,
    mut shutdown_rx: broadcast::Receiver<()>,
    completed: Arc<AtomicU64>,
) {
    tracing::debug!("ship worker started");
    loop {
        tokio::select! {
            trigger = rx.recv() => match trigger {
                Some(trigger) => execute(&orchestrator, trigger, &completed).await,
                None => break,
            },
            _ = shutdown_rx.recv() => {
                rx.close();
                let mut drained = 0usize;
                while let Some(trigger) = rx.recv().await {
                    execute(&orchestrator, trigger, &completed).await;
                    drained += 1;
                }
                tracing::info!(drained, "ship queue closed");
                break;
            }
        }
    }
    tracing::debug!("ship worker stopped");
}

async fn execute<E: ReportExporter>(
    orchestrator: &ShipOrchestrator<E>,
    trigger: ShipTrigger,
    completed: &AtomicU64,
) {
    let waited_ms = u64::try_from(trigger.queued_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        trigger_id = %trigger.id,
        requested_by = ?trigger.requested_by,
        waited_ms,
        "shipping latest report"
    );

    // Run failures are logged and counted by the orchestrator; the worker
    // keeps serving the queue.
    if let Ok(report) = orchestrator.run_default().await {
        tracing::debug!(trigger_id = %trigger.id, run_id = %report.run_id, "trigger served");
    }
    completed.fetch_add(1, Ordering::Relaxed);
}
