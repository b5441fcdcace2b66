#![allow(dead_code)]

use deploy_core::{
    update, Category, DeployStatusUpdate, Effect, JobStatus, LogLine, Msg, Session, StartOutcome,
    TickReport,
};

pub fn init_logging() {
    deploy_logging::initialize_for_tests();
}

pub fn active_session() -> Session {
    let (session, _) = update(Session::new(), Msg::StartClicked);
    let (session, _) = update(session, Msg::StartResponded(StartOutcome::Started));
    session
}

pub fn lines(raw: &[(u64, &str)]) -> Vec<LogLine> {
    raw.iter()
        .map(|(offset, text)| LogLine::new(*offset, *text))
        .collect()
}

pub fn running() -> Option<JobStatus> {
    Some(JobStatus {
        running: true,
        paused: false,
    })
}

pub fn idle() -> Option<JobStatus> {
    Some(JobStatus::default())
}

pub fn tick(session: Session, status: Option<JobStatus>, batch: Vec<LogLine>) -> (Session, Vec<Effect>) {
    update(
        session,
        Msg::Tick(TickReport {
            status,
            lines: Some(batch),
            tail_running: None,
            activity: None,
        }),
    )
}

pub fn appended(effects: &[Effect]) -> Vec<(Category, String)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::AppendLog { category, text } => Some((*category, text.clone())),
            _ => None,
        })
        .collect()
}

pub fn percents(effects: &[Effect]) -> Vec<u8> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::SetProgress(progress) => Some(progress.percent),
            _ => None,
        })
        .collect()
}

pub fn saved(effects: &[Effect]) -> Vec<DeployStatusUpdate> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::SaveDeployStatus(update) => Some(update.clone()),
            _ => None,
        })
        .collect()
}

pub fn finalized_count(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|effect| matches!(effect, Effect::SessionFinalized(_)))
        .count()
}

/// A complete, realistic job log.
pub const JOB_LOG: &[(u64, &str)] = &[
    (1, "Setting up export"),
    (2, "Creating archive directory"),
    (3, "Starting URL discovery"),
    (4, "Discovery complete: 134 total URLs found"),
    (5, "(1/134) Fetched: https://example.com/"),
    (6, "(2/134) Fetched: https://example.com/about/"),
    (7, "↪️ Redirect https://example.com/old -> https://example.com/new"),
    (8, "R2: Starting rclone bulk upload"),
    (9, "R2: Uploaded 40 images"),
    (10, "R2: ✅ rclone bulk upload completed"),
    (11, "GitHub: Pushing 120 files"),
    (12, "GitHub: Pushed batch 1"),
    (13, "GitHub: Push complete!"),
    (14, "Pages: Auto-deploy started"),
    (15, "Wrapping up"),
    (16, "Export completed successfully"),
];
