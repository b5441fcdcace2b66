//! Deploy tracker core: pure session state machine and log interpretation.
mod classify;
mod cursor;
mod dedup;
mod effect;
mod guard;
mod msg;
mod progress;
mod stage;
mod state;
mod update;
mod view_model;

pub use classify::{classify, classify_line, is_noise, Category, Classification, ClassifiedEvent};
pub use cursor::{LogLine, TailCursor};
pub use dedup::{fingerprint, Deduplicator, FINGERPRINT_CHARS};
pub use effect::{DeployStatusUpdate, Effect};
pub use guard::{CompletionGuard, CompletionTrigger};
pub use msg::Msg;
pub use progress::{
    estimate, CategoryCounters, Counter, Progress, ProgressEstimator, UrlProgress, UrlUpdate,
    ESTIMATE_CAP,
};
pub use stage::{PipelineState, Stage, StageSignal, StageState, StageTracker, Transition};
pub use state::{
    ActivityEntry, JobStatus, Session, SessionError, SessionOutcome, SessionPhase,
    SessionSummary, StartOutcome, TickReport,
};
pub use update::update;
pub use view_model::{SessionView, StageRowView};
