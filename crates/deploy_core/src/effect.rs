use crate::classify::Category;
use crate::progress::{Progress, UrlProgress};
use crate::stage::{PipelineState, Stage, StageState};
use crate::state::{SessionError, SessionSummary};

/// Side effects requested by the session. The first group is rendered by the
/// UI sinks, the second is carried out against the job runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    AppendLog { category: Category, text: String },
    ClearLog,
    SetStageStatus { stage: Stage, state: StageState },
    SetProgress(Progress),
    SetUrlProgress(UrlProgress),
    SessionFinalized(SessionSummary),

    StartJob,
    StartPolling,
    StopPolling,
    CancelJob,
    ForceStop,
    /// Fire and forget; a failed save never reaches the session.
    SaveDeployStatus(DeployStatusUpdate),

    /// A request was refused in the current phase.
    Rejected(SessionError),
}

/// Server-side record of the current run, written as it changes so another
/// viewer can show the last deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStatusUpdate {
    /// A fresh start drops whatever the previous run left behind.
    Reset,
    /// A stage settled as completed or failed.
    Stage { stage: Stage, state: StageState },
    /// Every stage once the run is finalized.
    Final(PipelineState),
}
