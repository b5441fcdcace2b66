#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};

use deploy_core::{ActivityEntry, Category, DeployStatusUpdate, JobStatus, LogLine};
use deploy_engine::{
    ApiError, ChannelSink, DeployApi, DriverSettings, FailureKind, FullLog, RcloneStatus,
    SessionDriver, StartResponse, TailBatch, UiEvent,
};

pub fn init_logging() {
    deploy_logging::initialize_for_tests();
}

pub fn running() -> JobStatus {
    JobStatus {
        running: true,
        paused: false,
    }
}

pub fn idle() -> JobStatus {
    JobStatus::default()
}

pub fn network_error() -> ApiError {
    ApiError {
        kind: FailureKind::Network,
        message: "connection refused".to_string(),
    }
}

pub fn batch(raw: &[(u64, &str)]) -> TailBatch {
    TailBatch {
        lines: raw
            .iter()
            .map(|(offset, text)| LogLine::new(*offset, *text))
            .collect(),
        running: None,
    }
}

/// In-memory job runner answering from scripted queues.
///
/// Empty queues fall back to a running job with no new lines.
pub struct ScriptedApi {
    statuses: Mutex<VecDeque<Result<JobStatus, ApiError>>>,
    batches: Mutex<VecDeque<Result<TailBatch, ApiError>>>,
    activity: Mutex<VecDeque<Vec<ActivityEntry>>>,
    start: Mutex<Option<Result<StartResponse, ApiError>>>,
    rclone: Mutex<Option<Result<RcloneStatus, ApiError>>>,
    full_log: Mutex<Option<Result<Option<FullLog>, ApiError>>>,
    fail_acks: bool,
    calls: Mutex<Vec<String>>,
    saved: Mutex<Vec<DeployStatusUpdate>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            batches: Mutex::new(VecDeque::new()),
            activity: Mutex::new(VecDeque::new()),
            start: Mutex::new(None),
            rclone: Mutex::new(None),
            full_log: Mutex::new(None),
            fail_acks: false,
            calls: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn with_statuses(self, statuses: Vec<Result<JobStatus, ApiError>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_batches(self, batches: Vec<Result<TailBatch, ApiError>>) -> Self {
        *self.batches.lock().unwrap() = batches.into();
        self
    }

    pub fn with_activity(self, activity: Vec<Vec<ActivityEntry>>) -> Self {
        *self.activity.lock().unwrap() = activity.into();
        self
    }

    pub fn with_start(self, start: Result<StartResponse, ApiError>) -> Self {
        *self.start.lock().unwrap() = Some(start);
        self
    }

    pub fn with_rclone(self, rclone: Result<RcloneStatus, ApiError>) -> Self {
        *self.rclone.lock().unwrap() = Some(rclone);
        self
    }

    pub fn with_full_log(self, full_log: Result<Option<FullLog>, ApiError>) -> Self {
        *self.full_log.lock().unwrap() = Some(full_log);
        self
    }

    pub fn failing_acks(mut self) -> Self {
        self.fail_acks = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Status saves, kept apart from `calls` so call order stays readable.
    pub fn saved(&self) -> Vec<DeployStatusUpdate> {
        self.saved.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn ack(&self) -> Result<(), ApiError> {
        if self.fail_acks {
            Err(network_error())
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl DeployApi for ScriptedApi {
    async fn check_status(&self) -> Result<JobStatus, ApiError> {
        self.record("is-running");
        self.statuses.lock().unwrap().pop_front().unwrap_or(Ok(running()))
    }

    async fn tail_log(&self, since: u64, _max_lines: u32) -> Result<TailBatch, ApiError> {
        self.record(format!("debug-log since={since}"));
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TailBatch::default()))
    }

    async fn start_job(&self) -> Result<StartResponse, ApiError> {
        self.record("start-export");
        self.start.lock().unwrap().clone().unwrap_or(Ok(StartResponse {
            status_code: Some(200),
            message: None,
        }))
    }

    async fn cancel_job(&self) -> Result<(), ApiError> {
        self.record("cancel-export");
        self.ack()
    }

    async fn force_stop(&self) -> Result<(), ApiError> {
        self.record("force-stop");
        self.ack()
    }

    async fn download_full_log(&self) -> Result<Option<FullLog>, ApiError> {
        self.record("debug-log full");
        self.full_log.lock().unwrap().clone().unwrap_or(Ok(None))
    }

    async fn check_rclone(&self) -> Result<RcloneStatus, ApiError> {
        self.record("check-rclone");
        self.rclone.lock().unwrap().clone().unwrap_or(Ok(RcloneStatus {
            available: true,
            path: Some("/usr/bin/rclone".to_string()),
        }))
    }

    async fn activity_log(&self) -> Result<Vec<ActivityEntry>, ApiError> {
        self.record("activity-log");
        Ok(self.activity.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn save_deploy_status(&self, update: &DeployStatusUpdate) -> Result<(), ApiError> {
        self.saved.lock().unwrap().push(update.clone());
        self.ack()
    }
}

pub struct Harness {
    pub api: Arc<ScriptedApi>,
    pub driver: SessionDriver,
    pub events: mpsc::Receiver<UiEvent>,
}

impl Harness {
    pub fn new(api: ScriptedApi, settings: DriverSettings) -> Self {
        init_logging();
        let api = Arc::new(api);
        let (tx, events) = mpsc::channel();
        let sink = Arc::new(ChannelSink::new(tx));
        let driver = SessionDriver::new(api.clone(), sink.clone(), sink, settings);
        Self {
            api,
            driver,
            events,
        }
    }

    pub fn drain(&self) -> Vec<UiEvent> {
        self.events.try_iter().collect()
    }

    pub fn drain_logs(&self) -> Vec<(Category, String)> {
        logs(&self.drain())
    }
}

pub fn logs(events: &[UiEvent]) -> Vec<(Category, String)> {
    events
        .iter()
        .filter_map(|event| match event {
            UiEvent::Log { category, text, .. } => Some((*category, text.clone())),
            _ => None,
        })
        .collect()
}
