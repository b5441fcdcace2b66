use crate::{CategoryCounters, Progress, SessionOutcome, SessionPhase, Stage, StageState, UrlProgress};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub progress: Option<Progress>,
    pub url_progress: UrlProgress,
    pub counters: CategoryCounters,
    pub stages: Vec<StageRowView>,
    pub cursor: u64,
    pub ticks: u64,
    pub last_outcome: Option<SessionOutcome>,
}

impl SessionView {
    pub fn stage(&self, stage: Stage) -> Option<StageState> {
        self.stages
            .iter()
            .find(|row| row.stage == stage)
            .map(|row| row.state)
    }

    pub fn percent(&self) -> u8 {
        self.progress.as_ref().map_or(0, |p| p.percent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRowView {
    pub stage: Stage,
    pub state: StageState,
}
