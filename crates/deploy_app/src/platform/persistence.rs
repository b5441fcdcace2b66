use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use deploy_core::{PipelineState, SessionOutcome, SessionSummary, Stage, StageState, UrlProgress};
use deploy_engine::{ensure_output_dir, AtomicFileWriter};
use deploy_logging::{deploy_error, deploy_info, deploy_warn};
use serde::{Deserialize, Serialize};

const STATE_FILENAME: &str = ".deploy_tracker_state.ron";

/// How the last followed deployment ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastDeployment {
    pub outcome: SessionOutcome,
    pub stages: PipelineState,
    pub url_progress: UrlProgress,
    pub finished_at: DateTime<Local>,
}

impl LastDeployment {
    pub fn from_summary(summary: &SessionSummary, finished_at: DateTime<Local>) -> Self {
        Self {
            outcome: summary.outcome,
            stages: summary.stages,
            url_progress: summary.url_progress,
            finished_at,
        }
    }
}

// deploy_core carries no serde, so stages and states are stored by their
// `as_str` names and parsed back here rather than derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedStage {
    stage: String,
    state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedDeployment {
    outcome: String,
    stages: Vec<PersistedStage>,
    processed: u32,
    total: u32,
    finished_at: DateTime<Local>,
}

pub(crate) fn load_last_deployment(state_dir: &Path) -> Option<LastDeployment> {
    let path = state_dir.join(STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return None;
        }
        Err(err) => {
            deploy_warn!("Failed to read last deployment from {:?}: {}", path, err);
            return None;
        }
    };

    let persisted: PersistedDeployment = match ron::from_str(&content) {
        Ok(state) => state,
        Err(err) => {
            deploy_warn!("Failed to parse last deployment from {:?}: {}", path, err);
            return None;
        }
    };

    let Some(outcome) = parse_outcome(&persisted.outcome) else {
        deploy_warn!("Unknown outcome {:?} in {:?}", persisted.outcome, path);
        return None;
    };
    // Stages this build does not know are dropped; missing ones read as pending.
    let stages = persisted
        .stages
        .iter()
        .filter_map(|row| Some((Stage::parse(&row.stage)?, StageState::parse(&row.state)?)))
        .collect();

    deploy_info!("Loaded last deployment from {:?}", path);
    Some(LastDeployment {
        outcome,
        stages,
        url_progress: UrlProgress {
            processed: persisted.processed,
            total: persisted.total,
        },
        finished_at: persisted.finished_at,
    })
}

pub(crate) fn save_last_deployment(state_dir: &Path, last: &LastDeployment) {
    if let Err(err) = ensure_output_dir(state_dir) {
        deploy_error!("Failed to ensure state dir {:?}: {}", state_dir, err);
        return;
    }

    let persisted = PersistedDeployment {
        outcome: last.outcome.as_str().to_string(),
        stages: last
            .stages
            .iter()
            .map(|(stage, state)| PersistedStage {
                stage: stage.as_str().to_string(),
                state: state.as_str().to_string(),
            })
            .collect(),
        processed: last.url_progress.processed,
        total: last.url_progress.total,
        finished_at: last.finished_at,
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&persisted, pretty) {
        Ok(text) => text,
        Err(err) => {
            deploy_error!("Failed to serialize last deployment: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(PathBuf::from(state_dir));
    if let Err(err) = writer.write(STATE_FILENAME, &content) {
        deploy_error!("Failed to write last deployment to {:?}: {}", state_dir, err);
    }
}

fn parse_outcome(raw: &str) -> Option<SessionOutcome> {
    [
        SessionOutcome::Completed,
        SessionOutcome::Cancelled,
        SessionOutcome::Aborted,
    ]
    .into_iter()
    .find(|outcome| outcome.as_str() == raw)
}
