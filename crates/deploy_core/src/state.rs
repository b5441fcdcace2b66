use deploy_logging::{deploy_debug, deploy_info};

use crate::classify::{classify, classify_line, Category};
use crate::cursor::{LogLine, TailCursor};
use crate::dedup::Deduplicator;
use crate::effect::{DeployStatusUpdate, Effect};
use crate::guard::{CompletionGuard, CompletionTrigger};
use crate::progress::{CategoryCounters, Progress, ProgressEstimator, UrlProgress};
use crate::stage::{PipelineState, Stage, StageSignal, StageState, StageTracker};
use crate::view_model::{SessionView, StageRowView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    /// Start requested, waiting for the job runner to answer.
    Starting,
    /// Polling.
    Active,
    Completed,
    Cancelled,
    Aborted,
}

impl SessionPhase {
    pub fn is_active(self) -> bool {
        matches!(self, SessionPhase::Starting | SessionPhase::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Cancelled,
    Aborted,
}

impl SessionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Cancelled => "cancelled",
            SessionOutcome::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a deployment session is already active")]
    AlreadyActive,
    #[error("no deployment session is active")]
    NotActive,
    #[error("the log cannot be cleared while a deployment is active")]
    ClearWhileActive,
}

/// Answer of the remote status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobStatus {
    pub running: bool,
    pub paused: bool,
}

impl JobStatus {
    pub fn is_idle(&self) -> bool {
        !self.running && !self.paused
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A job was already running; the session attaches to it.
    AlreadyRunning,
    Failed { message: String },
}

impl StartOutcome {
    pub fn from_status(status_code: u16, message: Option<String>) -> Self {
        match status_code {
            200 => StartOutcome::Started,
            409 => StartOutcome::AlreadyRunning,
            _ => StartOutcome::failed(message),
        }
    }

    /// A refused start; blank messages fall back to a generic one.
    pub fn failed(message: Option<String>) -> Self {
        StartOutcome::Failed {
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Failed to start export".to_string()),
        }
    }
}

/// One message of the overwrite-style activity feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub key: String,
    pub message: String,
}

/// What one tick observed. `None` means that request failed this tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TickReport {
    pub status: Option<JobStatus>,
    pub lines: Option<Vec<LogLine>>,
    /// `running` flag carried by the log-tail payload, if the server sent one.
    pub tail_running: Option<bool>,
    pub activity: Option<Vec<ActivityEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub outcome: SessionOutcome,
    pub stages: PipelineState,
    pub url_progress: UrlProgress,
    pub counters: CategoryCounters,
    pub trigger: Option<CompletionTrigger>,
}

impl SessionSummary {
    /// Only a user cancel counts; aborted runs report their own outcome.
    pub fn was_cancelled(&self) -> bool {
        self.outcome == SessionOutcome::Cancelled
    }
}

/// One deployment run: owns every piece of tracking state and is the only
/// thing that mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    phase: SessionPhase,
    cursor: TailCursor,
    dedup: Deduplicator,
    tracker: StageTracker,
    counters: CategoryCounters,
    url: UrlProgress,
    estimator: ProgressEstimator,
    guard: CompletionGuard,
    ticks: u64,
    last_summary: Option<SessionSummary>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn cursor(&self) -> TailCursor {
        self.cursor
    }

    pub fn pipeline(&self) -> &PipelineState {
        self.tracker.pipeline()
    }

    pub fn counters(&self) -> CategoryCounters {
        self.counters
    }

    pub fn url_progress(&self) -> UrlProgress {
        self.url
    }

    pub fn progress(&self) -> Option<&Progress> {
        self.estimator.current()
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            progress: self.estimator.current().cloned(),
            url_progress: self.url,
            counters: self.counters,
            stages: self
                .tracker
                .pipeline()
                .iter()
                .map(|(stage, state)| StageRowView { stage, state })
                .collect(),
            cursor: self.cursor.since(),
            ticks: self.ticks,
            last_outcome: self.last_summary.as_ref().map(|s| s.outcome),
        }
    }

    /// Begins a new run. Everything from the previous run is discarded.
    pub fn start(&mut self) -> Result<Vec<Effect>, SessionError> {
        if self.phase.is_active() {
            return Err(SessionError::AlreadyActive);
        }
        let mut effects = self.begin(SessionPhase::Starting);
        effects.push(Effect::SetProgress(
            self.estimator.seed(5, "🚀 Starting deployment..."),
        ));
        effects.push(Effect::ClearLog);
        effects.push(Effect::SaveDeployStatus(DeployStatusUpdate::Reset));
        effects.push(log(Category::Info, "🚀 Starting static site generation..."));
        effects.push(log(
            Category::Info,
            "⏳ Crawling site, uploading to R2, pushing to GitHub, deploying to Pages...",
        ));
        effects.push(Effect::StartJob);
        Ok(effects)
    }

    /// Follows a job that is already running without asking to start one.
    pub fn attach(&mut self) -> Result<Vec<Effect>, SessionError> {
        if self.phase.is_active() {
            return Err(SessionError::AlreadyActive);
        }
        let mut effects = self.begin(SessionPhase::Active);
        effects.push(Effect::SetProgress(
            self.estimator.seed(50, "Export in progress..."),
        ));
        effects.push(log(
            Category::Info,
            "Export already in progress, resuming status tracking...",
        ));
        effects.push(Effect::StartPolling);
        Ok(effects)
    }

    pub fn on_start_outcome(&mut self, outcome: StartOutcome) -> Vec<Effect> {
        if self.phase != SessionPhase::Starting {
            deploy_debug!("start outcome {:?} ignored in phase {:?}", outcome, self.phase);
            return Vec::new();
        }
        match outcome {
            StartOutcome::Started => {
                self.phase = SessionPhase::Active;
                vec![
                    log(Category::Success, "✅ Export started - watching for updates..."),
                    Effect::SetProgress(self.estimator.seed(10, "🔍 Discovering URLs...")),
                    Effect::StartPolling,
                ]
            }
            StartOutcome::AlreadyRunning => {
                self.phase = SessionPhase::Active;
                vec![
                    log(Category::Warning, "⚠️ Export already running - resuming tracking"),
                    Effect::StartPolling,
                ]
            }
            StartOutcome::Failed { message } => {
                let mut effects = vec![log(Category::Error, format!("❌ Error: {message}"))];
                effects.extend(self.terminate(SessionOutcome::Aborted));
                self.reset_tracking();
                effects
            }
        }
    }

    /// Folds one tick: status check, then new log lines, then completion.
    pub fn tick(&mut self, report: TickReport) -> Vec<Effect> {
        if self.phase != SessionPhase::Active {
            return Vec::new();
        }
        self.ticks += 1;
        let mut effects = Vec::new();

        let status_idle = report.status.is_some_and(|status| status.is_idle());

        let mut done_marker = false;
        if let Some(lines) = report.lines {
            for line in &lines {
                done_marker |= self.fold_line(line, &mut effects);
            }
            self.cursor.advance(&lines);
        }
        if let Some(activity) = report.activity {
            for entry in &activity {
                self.fold_activity(entry, &mut effects);
            }
        }
        if let Some(progress) = self.estimator.advance(&self.counters) {
            effects.push(Effect::SetProgress(progress));
        }

        let triggers = [
            (status_idle, CompletionTrigger::StatusIdle),
            (done_marker, CompletionTrigger::DoneMarker),
            (report.tail_running == Some(false), CompletionTrigger::TailIdle),
        ];
        for (fired, trigger) in triggers {
            if fired && self.guard.try_consume(trigger) {
                effects.extend(self.finalize(trigger));
            }
        }
        effects
    }

    /// Stops following the job. Completion triggers are not consulted.
    pub fn cancel(&mut self) -> Result<Vec<Effect>, SessionError> {
        if !self.phase.is_active() {
            return Err(SessionError::NotActive);
        }
        let mut effects = vec![log(Category::Warning, "Cancelling deployment...")];
        effects.extend(self.terminate(SessionOutcome::Cancelled));
        effects.push(Effect::CancelJob);
        effects.push(log(Category::Warning, "Deployment cancelled"));
        Ok(effects)
    }

    pub fn on_cancel_acknowledged(&mut self, ok: bool) -> Vec<Effect> {
        if ok {
            Vec::new()
        } else {
            vec![log(Category::Error, "Failed to cancel deployment")]
        }
    }

    /// Unconditional reset for a desynchronized client or a stuck server lock.
    pub fn force_stop(&mut self) -> Vec<Effect> {
        let mut effects = vec![log(
            Category::Warning,
            "Force stopping and clearing all locks...",
        )];
        if self.phase.is_active() {
            effects.extend(self.terminate(SessionOutcome::Aborted));
        } else {
            effects.push(Effect::StopPolling);
        }
        self.reset_tracking();
        self.tracker.reset();
        self.guard.reset();
        self.estimator.reset();
        effects.push(Effect::SetUrlProgress(self.url));
        effects.push(Effect::ForceStop);
        effects
    }

    pub fn on_force_stop_acknowledged(&mut self, ok: bool) -> Vec<Effect> {
        if ok {
            vec![log(
                Category::Success,
                "✅ Force stop complete - all locks cleared. You can start a new export.",
            )]
        } else {
            vec![log(Category::Error, "Failed to force stop")]
        }
    }

    pub fn clear_log(&mut self) -> Result<Vec<Effect>, SessionError> {
        if self.phase.is_active() {
            return Err(SessionError::ClearWhileActive);
        }
        self.reset_tracking();
        Ok(vec![
            Effect::ClearLog,
            log(Category::Info, "Log cleared. Ready to deploy."),
            Effect::SetUrlProgress(self.url),
        ])
    }

    fn begin(&mut self, phase: SessionPhase) -> Vec<Effect> {
        self.reset_tracking();
        self.tracker.reset();
        self.guard.reset();
        self.estimator.reset();
        self.ticks = 0;
        self.last_summary = None;
        self.phase = phase;
        deploy_info!("session entering {:?}", phase);

        let mut effects: Vec<Effect> = Stage::ALL
            .into_iter()
            .map(|stage| Effect::SetStageStatus {
                stage,
                state: StageState::Pending,
            })
            .collect();
        effects.push(Effect::SetUrlProgress(self.url));
        effects
    }

    fn fold_line(&mut self, line: &LogLine, effects: &mut Vec<Effect>) -> bool {
        if !self.dedup.admit(line) {
            return false;
        }
        let Some(event) = classify_line(line.clone()) else {
            return false;
        };
        let classification = event.classification;

        let mut url_changed = false;
        for update in &classification.url_updates {
            url_changed |= self.url.apply(*update);
        }
        if url_changed {
            effects.push(Effect::SetUrlProgress(self.url));
        }

        for signal in &classification.signals {
            self.apply_signal(*signal, effects);
        }
        if classification.mentions_fetched && self.url.is_exhausted() {
            self.apply_signal(StageSignal::completed(Stage::Export), effects);
        }

        if let Some(counter) = classification.counter {
            self.counters.increment(counter);
        }
        effects.push(log(classification.category, event.line.text));
        classification.job_finished
    }

    fn fold_activity(&mut self, entry: &ActivityEntry, effects: &mut Vec<Effect>) {
        if !self.dedup.admit_task(&entry.key, &entry.message) {
            return;
        }
        let Some(classification) = classify(&entry.message) else {
            return;
        };
        if let Some(counter) = classification.counter {
            self.counters.increment(counter);
        }
        effects.push(log(classification.category, entry.message.clone()));
    }

    fn apply_signal(&mut self, signal: StageSignal, effects: &mut Vec<Effect>) {
        if let Some(state) = self.tracker.apply(signal) {
            push_stage_state(signal.stage, state, effects);
        }
    }

    fn finalize(&mut self, trigger: CompletionTrigger) -> Vec<Effect> {
        deploy_info!("session finalized via {:?}", trigger);
        let mut effects = vec![Effect::StopPolling];
        effects.push(Effect::SetProgress(self.estimator.finalize()));
        for (stage, state) in self.tracker.finalize() {
            push_stage_state(stage, state, &mut effects);
        }

        let pipeline = self.tracker.pipeline();
        let mark = |stage: Stage| {
            if pipeline.is_completed(stage) {
                "✅"
            } else {
                "⚠️"
            }
        };
        effects.push(log(
            Category::Success,
            format!(
                "🎉 Deployment completed! {} R2  {} GitHub  {} CF Pages",
                mark(Stage::R2),
                mark(Stage::Github),
                mark(Stage::Pages)
            ),
        ));

        effects.push(Effect::SaveDeployStatus(DeployStatusUpdate::Final(
            *self.tracker.pipeline(),
        )));

        self.phase = SessionPhase::Completed;
        let summary = self.summary(SessionOutcome::Completed, Some(trigger));
        self.last_summary = Some(summary.clone());
        effects.push(Effect::SessionFinalized(summary));

        // Counters and cursor start over for the next run; stage states stay
        // visible until then.
        self.reset_tracking();
        effects.push(Effect::SetUrlProgress(self.url));
        effects
    }

    fn terminate(&mut self, outcome: SessionOutcome) -> Vec<Effect> {
        self.phase = match outcome {
            SessionOutcome::Completed => SessionPhase::Completed,
            SessionOutcome::Cancelled => SessionPhase::Cancelled,
            SessionOutcome::Aborted => SessionPhase::Aborted,
        };
        deploy_info!("session {}", outcome.as_str());
        let summary = self.summary(outcome, None);
        self.last_summary = Some(summary.clone());
        vec![Effect::StopPolling, Effect::SessionFinalized(summary)]
    }

    fn summary(&self, outcome: SessionOutcome, trigger: Option<CompletionTrigger>) -> SessionSummary {
        SessionSummary {
            outcome,
            stages: *self.tracker.pipeline(),
            url_progress: self.url,
            counters: self.counters,
            trigger,
        }
    }

    fn reset_tracking(&mut self) {
        self.cursor.reset();
        self.dedup.reset();
        self.counters = CategoryCounters::default();
        self.url = UrlProgress::default();
    }
}

/// Settled stages are also recorded on the server.
fn push_stage_state(stage: Stage, state: StageState, effects: &mut Vec<Effect>) {
    effects.push(Effect::SetStageStatus { stage, state });
    if matches!(state, StageState::Completed | StageState::Failed) {
        effects.push(Effect::SaveDeployStatus(DeployStatusUpdate::Stage {
            stage,
            state,
        }));
    }
}

fn log(category: Category, text: impl Into<String>) -> Effect {
    Effect::AppendLog {
        category,
        text: text.into(),
    }
}
