//! Training coordinator: keeps the retrieval index in step with the
//! document set.
//!
//! # Job flow
//!
//! ```text
//! on_documents_changed(revision)
//!   └─▶ cancel previous job, publish Idle
//!         └─▶ spawn job                                   [Pending]
//!               ├─ start_training
//!               └─ every poll_interval: training_status
//!                     ├─ done    → publish Ready, stop    [Ready]
//!                     ├─ failed  → publish Failed          [Failed]
//!                     │            sleep restart_delay → start again
//!                     └─ other   → keep polling
//! ```
//!
//! Every job owns a [`CancellationToken`] and a generation number. The
//! token stops its timers and requests; the generation check happens under
//! the slot lock right before each publish, so a job that was superseded
//! between two suspension points can never overwrite the state of its
//! successor.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, JobStatus};
use crate::config::TrainingConfig;

use super::state::TrainingState;

// ---------------------------------------------------------------------------
// JobSlot
// ---------------------------------------------------------------------------

#[derive(Default)]
struct JobSlot {
    generation: u64,
    revision: Option<u64>,
    cancel: Option<CancellationToken>,
}

fn lock_slot(slot: &Mutex<JobSlot>) -> MutexGuard<'_, JobSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// TrainingCoordinator
// ---------------------------------------------------------------------------

/// Owns the training job for the current document-set revision.
///
/// Must be driven from inside a tokio runtime; each job runs as its own task.
pub struct TrainingCoordinator {
    backend: Arc<dyn Backend>,
    config: TrainingConfig,
    state: Arc<watch::Sender<TrainingState>>,
    slot: Arc<Mutex<JobSlot>>,
}

impl TrainingCoordinator {
    pub fn new(backend: Arc<dyn Backend>, config: TrainingConfig) -> Self {
        let (state, _) = watch::channel(TrainingState::Idle);
        Self {
            backend,
            config,
            state: Arc::new(state),
            slot: Arc::new(Mutex::new(JobSlot::default())),
        }
    }

    pub fn state(&self) -> TrainingState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrainingState> {
        self.state.subscribe()
    }

    /// React to a new document-set revision.
    ///
    /// Repeated calls with the revision already being handled are ignored.
    /// Otherwise the running job (if any) is cancelled and a new one starts,
    /// unless the set is empty, in which case the coordinator stays `Idle`.
    pub fn on_documents_changed(&self, revision: u64, document_count: usize) {
        let mut slot = lock_slot(&self.slot);
        if slot.revision == Some(revision) {
            return;
        }

        if let Some(previous) = slot.cancel.take() {
            log::debug!("training: revision {revision} supersedes running job");
            previous.cancel();
        }
        slot.generation += 1;
        slot.revision = Some(revision);
        self.state.send_replace(TrainingState::Idle);

        if document_count == 0 {
            log::info!("training: no documents, index stays idle");
            return;
        }

        let cancel = CancellationToken::new();
        slot.cancel = Some(cancel.clone());

        let job = Job {
            generation: slot.generation,
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            slot: Arc::clone(&self.slot),
            cancel,
        };
        drop(slot);

        log::info!("training: starting job for revision {revision} ({document_count} documents)");
        tokio::spawn(job.run());
    }

    /// Abandon the current job and return to `Idle`.
    pub fn cancel(&self) {
        let mut slot = lock_slot(&self.slot);
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        slot.generation += 1;
        slot.revision = None;
        self.state.send_replace(TrainingState::Idle);
    }
}

impl Drop for TrainingCoordinator {
    fn drop(&mut self) {
        if let Some(cancel) = lock_slot(&self.slot).cancel.take() {
            cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

enum Outcome {
    Ready,
    Failed,
}

struct Job {
    generation: u64,
    backend: Arc<dyn Backend>,
    config: TrainingConfig,
    state: Arc<watch::Sender<TrainingState>>,
    slot: Arc<Mutex<JobSlot>>,
    cancel: CancellationToken,
}

impl Job {
    async fn run(self) {
        loop {
            if !self.publish(TrainingState::Pending) {
                return;
            }

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return,
                outcome = self.attempt() => outcome,
            };

            match outcome {
                Outcome::Ready => {
                    if self.publish(TrainingState::Ready) {
                        log::info!("training: index ready");
                    }
                    return;
                }
                Outcome::Failed => {
                    if !self.publish(TrainingState::Failed) {
                        return;
                    }
                    log::warn!(
                        "training: job failed, restarting in {:?}",
                        self.config.restart_delay()
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.config.restart_delay()) => {}
                    }
                }
            }
        }
    }

    /// One start + poll cycle, ending at the first terminal status.
    async fn attempt(&self) -> Outcome {
        if let Err(e) = self.backend.start_training().await {
            log::warn!("training: start request failed: {e}");
            return Outcome::Failed;
        }

        loop {
            tokio::time::sleep(self.config.poll_interval()).await;
            match self.backend.training_status().await {
                Ok(status) if !status.is_terminal() => {
                    log::debug!("training: status {status:?}")
                }
                Ok(JobStatus::Done) => return Outcome::Ready,
                Ok(_) => return Outcome::Failed,
                Err(e) => log::warn!("training: status poll failed: {e}"),
            }
        }
    }

    /// Publish `state` unless this job has been superseded.
    fn publish(&self, state: TrainingState) -> bool {
        let slot = lock_slot(&self.slot);
        if slot.generation != self.generation || self.cancel.is_cancelled() {
            log::debug!("training: dropping stale {state:?} from job {}", self.generation);
            return false;
        }
        self.state.send_replace(state);
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
