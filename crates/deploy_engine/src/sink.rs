use std::sync::mpsc;

use chrono::{DateTime, Local};
use deploy_core::{Category, SessionSummary, Stage, StageState};

/// Receives log entries for display.
///
/// Entries arrive oldest first. Whether they are shown newest-first is up to
/// the implementation.
pub trait LogSink: Send + Sync {
    fn append(&self, category: Category, text: &str, timestamp: DateTime<Local>);

    /// Drops everything shown so far.
    fn clear(&self) {}
}

/// Receives stage, progress and end-of-session updates.
pub trait StatusSink: Send + Sync {
    fn set_stage_status(&self, stage: Stage, state: StageState);

    fn set_progress(&self, percent: u8, label: &str);

    fn set_url_progress(&self, _processed: u32, _total: u32) {}

    fn session_finalized(&self, summary: &SessionSummary);
}

/// Everything a sink can be told, as one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Log {
        category: Category,
        text: String,
        timestamp: DateTime<Local>,
    },
    ClearLog,
    StageStatus {
        stage: Stage,
        state: StageState,
    },
    Progress {
        percent: u8,
        label: String,
    },
    UrlProgress {
        processed: u32,
        total: u32,
    },
    Finalized(SessionSummary),
}

/// Forwards sink calls over a channel, for a UI living on another thread.
pub struct ChannelSink {
    tx: mpsc::Sender<UiEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<UiEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }
}

impl LogSink for ChannelSink {
    fn append(&self, category: Category, text: &str, timestamp: DateTime<Local>) {
        self.send(UiEvent::Log {
            category,
            text: text.to_string(),
            timestamp,
        });
    }

    fn clear(&self) {
        self.send(UiEvent::ClearLog);
    }
}

impl StatusSink for ChannelSink {
    fn set_stage_status(&self, stage: Stage, state: StageState) {
        self.send(UiEvent::StageStatus { stage, state });
    }

    fn set_progress(&self, percent: u8, label: &str) {
        self.send(UiEvent::Progress {
            percent,
            label: label.to_string(),
        });
    }

    fn set_url_progress(&self, processed: u32, total: u32) {
        self.send(UiEvent::UrlProgress { processed, total });
    }

    fn session_finalized(&self, summary: &SessionSummary) {
        self.send(UiEvent::Finalized(summary.clone()));
    }
}
