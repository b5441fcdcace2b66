use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use deploy_core::{
    update, Category, Effect, Msg, Session, SessionError, SessionView, StartOutcome, TickReport,
};
use deploy_logging::{deploy_debug, deploy_info, deploy_warn, set_poll_tick};

use crate::tail::fetch_tail;
use crate::{
    debug_log_filename, AtomicFileWriter, DeployApi, DriverError, LogSink, RcloneStatus,
    StatusSink,
};

#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub poll_interval: Duration,
    pub tail_max_lines: u32,
    /// Check for rclone on the server before asking for a start.
    pub require_rclone: bool,
    /// Also poll the overwrite-style activity feed each tick.
    pub follow_activity_feed: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            tail_max_lines: 200,
            require_rclone: false,
            follow_activity_feed: false,
        }
    }
}

/// Owns one [`Session`] and carries out the effects it asks for.
///
/// Every message goes through [`deploy_core::update`]; effects are either
/// forwarded to the sinks or turned into job-runner calls whose answers are
/// fed back as further messages, in order, before the call returns.
pub struct SessionDriver {
    api: Arc<dyn DeployApi>,
    log: Arc<dyn LogSink>,
    status: Arc<dyn StatusSink>,
    settings: DriverSettings,
    session: Session,
    polling: bool,
}

impl SessionDriver {
    pub fn new(
        api: Arc<dyn DeployApi>,
        log: Arc<dyn LogSink>,
        status: Arc<dyn StatusSink>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            api,
            log,
            status,
            settings,
            session: Session::new(),
            polling: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub async fn start(&mut self) -> Result<(), DriverError> {
        if self.session.phase().is_active() {
            return Err(SessionError::AlreadyActive.into());
        }
        if self.settings.require_rclone {
            self.preflight_rclone().await?;
        }
        self.dispatch(Msg::StartClicked).await
    }

    /// Follows a job that is already running. Returns false if none is.
    pub async fn attach_if_running(&mut self) -> Result<bool, DriverError> {
        let status = self.api.check_status().await?;
        if !status.running {
            deploy_debug!("no running job to attach to");
            return Ok(false);
        }
        self.dispatch(Msg::AttachRequested).await?;
        Ok(true)
    }

    /// One poll: status, then new log lines, then the activity feed.
    /// Request failures are logged and retried next time.
    pub async fn tick(&mut self) -> Result<(), DriverError> {
        if !self.polling {
            return Ok(());
        }
        set_poll_tick(self.session.ticks() + 1);

        let status = match self.api.check_status().await {
            Ok(status) => Some(status),
            Err(err) => {
                deploy_warn!("status check failed: {}", err);
                None
            }
        };
        let (lines, tail_running) = match fetch_tail(
            self.api.as_ref(),
            self.session.cursor(),
            self.settings.tail_max_lines,
        )
        .await
        {
            Some(batch) => (Some(batch.lines), batch.running),
            None => (None, None),
        };
        let activity = if self.settings.follow_activity_feed {
            match self.api.activity_log().await {
                Ok(entries) => Some(entries),
                Err(err) => {
                    deploy_warn!("activity feed fetch failed: {}", err);
                    None
                }
            }
        } else {
            None
        };

        self.dispatch(Msg::Tick(TickReport {
            status,
            lines,
            tail_running,
            activity,
        }))
        .await
    }

    pub async fn cancel(&mut self) -> Result<(), DriverError> {
        self.dispatch(Msg::CancelClicked).await
    }

    pub async fn force_stop(&mut self) -> Result<(), DriverError> {
        self.dispatch(Msg::ForceStopClicked).await
    }

    pub async fn clear_log(&mut self) -> Result<(), DriverError> {
        self.dispatch(Msg::ClearLogClicked).await
    }

    /// Saves the whole remote log into `dir`. `Ok(None)` means the server had
    /// nothing to give.
    pub async fn download_log(&mut self, dir: &Path) -> Result<Option<PathBuf>, DriverError> {
        let full_log = match self.api.download_full_log().await {
            Ok(full_log) => full_log,
            Err(err) => {
                deploy_warn!("full log download failed: {}", err);
                self.append(Category::Error, "Failed to download log");
                return Err(err.into());
            }
        };
        let Some(full_log) = full_log else {
            self.append(Category::Warning, "No log data available");
            return Ok(None);
        };

        let writer = AtomicFileWriter::new(dir);
        let path = match writer.write(&debug_log_filename(&Local::now()), &full_log.text) {
            Ok(path) => path,
            Err(err) => {
                self.append(Category::Error, "Failed to download log");
                return Err(err.into());
            }
        };
        deploy_info!("saved {} log lines to {}", full_log.line_count, path.display());
        self.append(
            Category::Success,
            &format!("Log downloaded ({} lines)", full_log.line_count),
        );
        Ok(Some(path))
    }

    async fn preflight_rclone(&mut self) -> Result<(), DriverError> {
        self.append(Category::Info, "Checking rclone availability...");
        match self.api.check_rclone().await {
            Ok(RcloneStatus {
                available: true,
                path,
            }) => {
                let path = path.unwrap_or_else(|| "unknown".to_string());
                self.append(Category::Success, &format!("rclone found at: {path}"));
                Ok(())
            }
            Ok(_) => {
                self.append(
                    Category::Error,
                    "ERROR: rclone is enabled but not installed on this server!",
                );
                self.append(
                    Category::Error,
                    "Please install rclone (https://rclone.org/install/) or disable the rclone option.",
                );
                Err(DriverError::Preflight(
                    "rclone is not installed on the server".to_string(),
                ))
            }
            Err(err) => {
                deploy_warn!("rclone check failed: {}", err);
                self.append(
                    Category::Error,
                    "Failed to check rclone: Failed to check rclone availability",
                );
                Err(DriverError::Preflight(err.to_string()))
            }
        }
    }

    async fn dispatch(&mut self, msg: Msg) -> Result<(), DriverError> {
        let mut queue = VecDeque::from([msg]);
        let mut rejection = None;

        while let Some(msg) = queue.pop_front() {
            let (session, effects) = update(std::mem::take(&mut self.session), msg);
            self.session = session;

            for effect in effects {
                match effect {
                    Effect::AppendLog { category, text } => self.append(category, &text),
                    Effect::ClearLog => self.log.clear(),
                    Effect::SetStageStatus { stage, state } => {
                        self.status.set_stage_status(stage, state)
                    }
                    Effect::SetProgress(progress) => {
                        self.status.set_progress(progress.percent, &progress.label)
                    }
                    Effect::SetUrlProgress(url) => {
                        self.status.set_url_progress(url.processed, url.total)
                    }
                    Effect::SessionFinalized(summary) => self.status.session_finalized(&summary),
                    Effect::StartJob => {
                        let outcome = match self.api.start_job().await {
                            Ok(response) => response.outcome(),
                            Err(err) => {
                                deploy_warn!("start request failed: {}", err);
                                StartOutcome::failed(None)
                            }
                        };
                        queue.push_back(Msg::StartResponded(outcome));
                    }
                    Effect::StartPolling => self.polling = true,
                    Effect::StopPolling => self.polling = false,
                    Effect::CancelJob => {
                        let ok = acknowledged("cancel", self.api.cancel_job().await);
                        queue.push_back(Msg::CancelAcknowledged { ok });
                    }
                    Effect::ForceStop => {
                        let ok = acknowledged("force stop", self.api.force_stop().await);
                        queue.push_back(Msg::ForceStopAcknowledged { ok });
                    }
                    Effect::SaveDeployStatus(update) => {
                        acknowledged("deploy status", self.api.save_deploy_status(&update).await);
                    }
                    Effect::Rejected(err) => {
                        deploy_debug!("request rejected: {}", err);
                        rejection.get_or_insert(err);
                    }
                }
            }
        }

        match rejection {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn append(&self, category: Category, text: &str) {
        self.log.append(category, text, Local::now());
    }
}

fn acknowledged(what: &str, result: Result<(), crate::ApiError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            deploy_warn!("{} request failed: {}", what, err);
            false
        }
    }
}
