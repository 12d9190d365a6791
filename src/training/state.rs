//! Training job state machine.

/// States of the retrieval-index training job.
///
/// ```text
/// Idle ──documents present──▶ Pending ──status done──▶ Ready
///                               │
///                               └──status failed──▶ Failed ──restart delay──▶ Pending
/// any state ──document set changed──▶ Idle ──▶ Pending (new job)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainingState {
    /// No job: nothing to index, or a job was just discarded.
    #[default]
    Idle,
    /// A job was submitted and is being polled.
    Pending,
    /// The index covers the current document set; retrieval may run.
    Ready,
    /// The last job failed; a single restart is scheduled.
    Failed,
}

impl TrainingState {
    /// Only `Ready` lets retrieval queries through.
    ///
    /// ```
    /// use documind::training::TrainingState;
    ///
    /// assert!(TrainingState::Ready.is_ready());
    /// assert!(!TrainingState::Pending.is_ready());
    /// ```
    pub fn is_ready(self) -> bool {
        self == TrainingState::Ready
    }

    pub fn is_busy(self) -> bool {
        matches!(self, TrainingState::Pending | TrainingState::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            TrainingState::Idle => "Idle",
            TrainingState::Pending => "Training",
            TrainingState::Ready => "Ready",
            TrainingState::Failed => "Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert_eq!(TrainingState::default(), TrainingState::Idle);
    }

    #[test]
    fn only_ready_is_ready() {
        assert!(!TrainingState::Idle.is_ready());
        assert!(!TrainingState::Pending.is_ready());
        assert!(TrainingState::Ready.is_ready());
        assert!(!TrainingState::Failed.is_ready());
    }

    #[test]
    fn failed_counts_as_busy() {
        assert!(TrainingState::Failed.is_busy());
        assert!(TrainingState::Pending.is_busy());
        assert!(!TrainingState::Ready.is_busy());
        assert!(!TrainingState::Idle.is_busy());
    }

    #[test]
    fn labels() {
        assert_eq!(TrainingState::Pending.label(), "Training");
        assert_eq!(TrainingState::Ready.label(), "Ready");
    }
}
