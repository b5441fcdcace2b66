use std::fmt;

/// One of the seven phases of a deployment job, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Setup,
    Discover,
    Export,
    R2,
    Github,
    Pages,
    Wrapup,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Setup,
        Stage::Discover,
        Stage::Export,
        Stage::R2,
        Stage::Github,
        Stage::Pages,
        Stage::Wrapup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Discover => "discover",
            Stage::Export => "export",
            Stage::R2 => "r2",
            Stage::Github => "github",
            Stage::Pages => "pages",
            Stage::Wrapup => "wrapup",
        }
    }

    pub fn parse(raw: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| stage.as_str() == raw)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StageState {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StageState {
    /// Terminal states never change again within a session.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageState::Completed | StageState::Failed | StageState::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::InProgress => "in_progress",
            StageState::Completed => "completed",
            StageState::Failed => "failed",
            StageState::Skipped => "skipped",
        }
    }

    pub fn parse(raw: &str) -> Option<StageState> {
        [
            StageState::Pending,
            StageState::InProgress,
            StageState::Completed,
            StageState::Failed,
            StageState::Skipped,
        ]
        .into_iter()
        .find(|state| state.as_str() == raw)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    InProgress,
    Completed,
}

/// A request, extracted from a log line, to move one stage forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageSignal {
    pub stage: Stage,
    pub transition: Transition,
}

impl StageSignal {
    pub const fn in_progress(stage: Stage) -> Self {
        Self {
            stage,
            transition: Transition::InProgress,
        }
    }

    pub const fn completed(stage: Stage) -> Self {
        Self {
            stage,
            transition: Transition::Completed,
        }
    }
}

/// State of every stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineState {
    states: [StageState; 7],
}

impl PipelineState {
    pub fn get(&self, stage: Stage) -> StageState {
        self.states[stage.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, StageState)> + '_ {
        Stage::ALL.into_iter().map(|stage| (stage, self.get(stage)))
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.get(stage) == StageState::Completed
    }

    fn set(&mut self, stage: Stage, state: StageState) {
        self.states[stage.index()] = state;
    }
}

impl FromIterator<(Stage, StageState)> for PipelineState {
    fn from_iter<I: IntoIterator<Item = (Stage, StageState)>>(iter: I) -> Self {
        let mut pipeline = PipelineState::default();
        for (stage, state) in iter {
            pipeline.set(stage, state);
        }
        pipeline
    }
}

/// Per-stage finite-state machine.
///
/// Stages only move forward: `pending → in_progress → completed`, or
/// `pending → completed` directly. `failed` and `skipped` are assigned only by
/// [`StageTracker::finalize`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageTracker {
    pipeline: PipelineState,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pipeline(&self) -> &PipelineState {
        &self.pipeline
    }

    pub fn reset(&mut self) {
        self.pipeline = PipelineState::default();
    }

    /// Applies a signal and returns the new state if the stage changed.
    pub fn apply(&mut self, signal: StageSignal) -> Option<StageState> {
        let current = self.pipeline.get(signal.stage);
        let next = match (current, signal.transition) {
            (StageState::Pending, Transition::InProgress) => StageState::InProgress,
            (StageState::Pending | StageState::InProgress, Transition::Completed) => {
                StageState::Completed
            }
            _ => return None,
        };
        self.pipeline.set(signal.stage, next);
        Some(next)
    }

    /// Resolves every stage to a terminal state and returns the changes.
    ///
    /// Prerequisites of a completed later stage are inferred first, then
    /// anything unresolved fails, except `discover`, which some job
    /// configurations bypass and therefore becomes `skipped`.
    pub fn finalize(&mut self) -> Vec<(Stage, StageState)> {
        let mut changes = Vec::new();
        let pipeline = self.pipeline;

        let downstream_done = pipeline.is_completed(Stage::Wrapup)
            || pipeline.is_completed(Stage::R2)
            || pipeline.is_completed(Stage::Github);
        if downstream_done {
            self.backfill(Stage::Setup, &mut changes);
            self.backfill(Stage::Export, &mut changes);
        }
        if self.pipeline.is_completed(Stage::Export) {
            self.backfill(Stage::Setup, &mut changes);
        }

        for stage in Stage::ALL {
            if self.pipeline.get(stage).is_terminal() {
                continue;
            }
            let forced = if stage == Stage::Discover {
                StageState::Skipped
            } else {
                StageState::Failed
            };
            self.pipeline.set(stage, forced);
            changes.push((stage, forced));
        }
        changes
    }

    fn backfill(&mut self, stage: Stage, changes: &mut Vec<(Stage, StageState)>) {
        if let Some(state) = self.apply(StageSignal::completed(stage)) {
            changes.push((stage, state));
        }
    }
}
