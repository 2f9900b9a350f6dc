//! Per-video processing state and admission control for transcode jobs.
//!
//! The coordinator owns the in-memory state map. Only one transition out of
//! `Pending` into `Processing` can win per video, however many callers race
//! on it, and completion is recorded exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::video::ProcessingState;

/// Outcome of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// This caller won the transition; a job should be spawned.
    Started,
    /// A job for this video is already in flight.
    AlreadyRunning,
    /// The video already transcoded successfully.
    AlreadyDone,
}

pub struct JobCoordinator {
    states: Mutex<HashMap<String, ProcessingState>>,
    permits: Arc<Semaphore>,
}

impl JobCoordinator {
    /// `max_concurrent` bounds how many transcodes run at once; callers
    /// beyond the bound queue on the semaphore in FIFO order.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Record a freshly ingested video as `Pending`. Existing entries are
    /// left untouched.
    pub fn register(&self, video_id: &str) {
        let mut states = self.states.lock().expect("state map lock poisoned");
        states
            .entry(video_id.to_string())
            .or_insert(ProcessingState::Pending);
    }

    /// Atomic check-and-set into `Processing`.
    ///
    /// `Pending`, `Failed` (explicit re-submission) and unknown IDs all
    /// admit a new run; `Processing` and `Ready` report themselves instead
    /// of queueing a duplicate.
    pub fn try_start(&self, video_id: &str) -> EnqueueOutcome {
        let mut states = self.states.lock().expect("state map lock poisoned");
        match states.get(video_id) {
            Some(ProcessingState::Processing) => EnqueueOutcome::AlreadyRunning,
            Some(ProcessingState::Ready) => EnqueueOutcome::AlreadyDone,
            _ => {
                states.insert(video_id.to_string(), ProcessingState::Processing);
                EnqueueOutcome::Started
            }
        }
    }

    /// Record job completion. Returns `false` when the video was not
    /// `Processing` — duplicate completion signals land here and are
    /// ignored rather than treated as errors.
    pub fn complete(&self, video_id: &str, succeeded: bool) -> bool {
        let mut states = self.states.lock().expect("state map lock poisoned");
        match states.get_mut(video_id) {
            Some(state @ ProcessingState::Processing) => {
                *state = if succeeded {
                    ProcessingState::Ready
                } else {
                    ProcessingState::Failed
                };
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, video_id: &str) -> Option<ProcessingState> {
        let states = self.states.lock().expect("state map lock poisoned");
        states.get(video_id).copied()
    }

    /// Acquire a slot in the bounded transcode pool, waiting FIFO behind
    /// earlier submissions when the pool is full.
    pub async fn acquire_slot(&self) -> OwnedSemaphorePermit {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("transcode pool semaphore closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lifecycle_follows_pending_processing_ready() {
        let coordinator = JobCoordinator::new(1);
        coordinator.register("v1");
        assert_eq!(coordinator.status("v1"), Some(ProcessingState::Pending));

        assert_eq!(coordinator.try_start("v1"), EnqueueOutcome::Started);
        assert_eq!(coordinator.status("v1"), Some(ProcessingState::Processing));

        assert!(coordinator.complete("v1", true));
        assert_eq!(coordinator.status("v1"), Some(ProcessingState::Ready));
    }

    #[test]
    fn second_enqueue_while_processing_is_rejected() {
        let coordinator = JobCoordinator::new(1);
        assert_eq!(coordinator.try_start("v1"), EnqueueOutcome::Started);
        assert_eq!(coordinator.try_start("v1"), EnqueueOutcome::AlreadyRunning);
    }

    #[test]
    fn enqueue_after_success_reports_already_done() {
        let coordinator = JobCoordinator::new(1);
        coordinator.try_start("v1");
        coordinator.complete("v1", true);
        assert_eq!(coordinator.try_start("v1"), EnqueueOutcome::AlreadyDone);
    }

    #[test]
    fn failed_video_can_be_resubmitted() {
        let coordinator = JobCoordinator::new(1);
        coordinator.try_start("v1");
        coordinator.complete("v1", false);
        assert_eq!(coordinator.status("v1"), Some(ProcessingState::Failed));

        // Explicit re-enqueue counts as a fresh submission.
        assert_eq!(coordinator.try_start("v1"), EnqueueOutcome::Started);
        assert_eq!(coordinator.status("v1"), Some(ProcessingState::Processing));
    }

    #[test]
    fn duplicate_completion_is_ignored() {
        let coordinator = JobCoordinator::new(1);
        coordinator.try_start("v1");
        assert!(coordinator.complete("v1", true));
        assert!(!coordinator.complete("v1", false));
        // The second signal must not overwrite the terminal state.
        assert_eq!(coordinator.status("v1"), Some(ProcessingState::Ready));
    }

    #[test]
    fn completion_for_unknown_video_is_ignored() {
        let coordinator = JobCoordinator::new(1);
        assert!(!coordinator.complete("ghost", true));
        assert_eq!(coordinator.status("ghost"), None);
    }

    #[test]
    fn concurrent_enqueues_admit_exactly_one_run() {
        let coordinator = Arc::new(JobCoordinator::new(4));
        coordinator.register("v1");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coordinator = coordinator.clone();
            handles.push(std::thread::spawn(move || coordinator.try_start("v1")));
        }

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let started = outcomes
            .iter()
            .filter(|o| **o == EnqueueOutcome::Started)
            .count();
        let running = outcomes
            .iter()
            .filter(|o| **o == EnqueueOutcome::AlreadyRunning)
            .count();

        assert_eq!(started, 1);
        assert_eq!(running, 15);
    }

    #[tokio::test]
    async fn pool_slots_are_bounded() {
        let coordinator = Arc::new(JobCoordinator::new(2));
        let first = coordinator.acquire_slot().await;
        let _second = coordinator.acquire_slot().await;

        // Third acquisition must wait until a slot frees up.
        let waiting = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator.acquire_slot().await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiting.is_finished());

        drop(first);
        waiting.await.unwrap();
    }
}
