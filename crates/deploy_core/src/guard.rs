use deploy_logging::deploy_debug;

/// The independent signals that can end a session successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionTrigger {
    /// Status poll reported neither running nor paused.
    StatusIdle,
    /// The log carried the definitive "job finished" line.
    DoneMarker,
    /// The log-tail payload reported the job as no longer running.
    TailIdle,
}

/// Exactly-once latch for session finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionGuard {
    consumed_by: Option<CompletionTrigger>,
}

impl CompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for the first trigger only.
    pub fn try_consume(&mut self, trigger: CompletionTrigger) -> bool {
        if let Some(first) = self.consumed_by {
            deploy_debug!("completion via {:?} ignored, already finalized via {:?}", trigger, first);
            return false;
        }
        self.consumed_by = Some(trigger);
        true
    }

    pub fn consumed_by(&self) -> Option<CompletionTrigger> {
        self.consumed_by
    }

    pub fn reset(&mut self) {
        self.consumed_by = None;
    }
}
