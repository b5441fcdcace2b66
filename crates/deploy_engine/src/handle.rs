use std::path::PathBuf;

use deploy_core::SessionSummary;
use deploy_logging::{deploy_info, deploy_warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{DriverError, SessionDriver};

type Reply<T> = oneshot::Sender<Result<T, DriverError>>;

enum DriverCommand {
    Start(Reply<()>),
    Attach(Reply<bool>),
    Cancel(Reply<()>),
    ForceStop(Reply<()>),
    ClearLog(Reply<()>),
    DownloadLog { dir: PathBuf, reply: Reply<Option<PathBuf>> },
}

/// Runs a [`SessionDriver`] on a tokio task: one loop that interleaves
/// commands with the poll timer, so a tick and a command never overlap.
pub struct DriverHandle {
    cmd_tx: mpsc::UnboundedSender<DriverCommand>,
    finished: watch::Receiver<Option<SessionSummary>>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Must be called from within a tokio runtime.
    pub fn spawn(driver: SessionDriver) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (finished_tx, finished) = watch::channel(None);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(driver, cmd_rx, finished_tx, shutdown.clone()));
        Self {
            cmd_tx,
            finished,
            shutdown,
            task,
        }
    }

    pub async fn start(&self) -> Result<(), DriverError> {
        self.request(DriverCommand::Start).await
    }

    pub async fn attach_if_running(&self) -> Result<bool, DriverError> {
        self.request(DriverCommand::Attach).await
    }

    pub async fn cancel(&self) -> Result<(), DriverError> {
        self.request(DriverCommand::Cancel).await
    }

    pub async fn force_stop(&self) -> Result<(), DriverError> {
        self.request(DriverCommand::ForceStop).await
    }

    pub async fn clear_log(&self) -> Result<(), DriverError> {
        self.request(DriverCommand::ClearLog).await
    }

    pub async fn download_log(&self, dir: PathBuf) -> Result<Option<PathBuf>, DriverError> {
        self.request(|reply| DriverCommand::DownloadLog { dir, reply })
            .await
    }

    /// Waits until the current session reaches a terminal state.
    pub async fn finished(&mut self) -> Result<SessionSummary, DriverError> {
        let summary = self
            .finished
            .wait_for(Option::is_some)
            .await
            .map_err(|_| DriverError::Stopped)?;
        summary.clone().ok_or(DriverError::Stopped)
    }

    /// Stops the loop and waits for the task to end. A running job is left alone.
    pub async fn shutdown(self) -> Result<(), DriverError> {
        self.shutdown.cancel();
        self.task.await.map_err(|_| DriverError::Stopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> DriverCommand,
    ) -> Result<T, DriverError> {
        let (reply, response) = oneshot::channel();
        self.cmd_tx
            .send(command(reply))
            .map_err(|_| DriverError::Stopped)?;
        response.await.map_err(|_| DriverError::Stopped)?
    }
}

async fn run(
    mut driver: SessionDriver,
    mut cmd_rx: mpsc::UnboundedReceiver<DriverCommand>,
    finished_tx: watch::Sender<Option<SessionSummary>>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(driver.settings().poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            command = cmd_rx.recv() => match command {
                Some(command) => handle_command(&mut driver, command, &finished_tx).await,
                None => break,
            },
            _ = interval.tick(), if driver.is_polling() => {
                if let Err(err) = driver.tick().await {
                    deploy_warn!("tick failed: {}", err);
                }
                publish(&driver, &finished_tx);
            }
        }
    }
    deploy_info!("session driver stopped");
}

async fn handle_command(
    driver: &mut SessionDriver,
    command: DriverCommand,
    finished_tx: &watch::Sender<Option<SessionSummary>>,
) {
    match command {
        DriverCommand::Start(reply) => {
            let result = driver.start().await;
            respond(driver, finished_tx, reply, result);
        }
        DriverCommand::Attach(reply) => {
            let result = driver.attach_if_running().await;
            respond(driver, finished_tx, reply, result);
        }
        DriverCommand::Cancel(reply) => {
            let result = driver.cancel().await;
            respond(driver, finished_tx, reply, result);
        }
        DriverCommand::ForceStop(reply) => {
            let result = driver.force_stop().await;
            respond(driver, finished_tx, reply, result);
        }
        DriverCommand::ClearLog(reply) => {
            let result = driver.clear_log().await;
            respond(driver, finished_tx, reply, result);
        }
        DriverCommand::DownloadLog { dir, reply } => {
            let result = driver.download_log(&dir).await;
            respond(driver, finished_tx, reply, result);
        }
    }
}

/// Publishes the session outcome before answering, so a caller that goes on
/// to wait for [`DriverHandle::finished`] sees the state its command produced.
fn respond<T>(
    driver: &SessionDriver,
    finished_tx: &watch::Sender<Option<SessionSummary>>,
    reply: Reply<T>,
    result: Result<T, DriverError>,
) {
    publish(driver, finished_tx);
    // A dropped receiver means the caller stopped waiting; the command still ran.
    let _ = reply.send(result);
}

fn publish(driver: &SessionDriver, finished_tx: &watch::Sender<Option<SessionSummary>>) {
    let latest = driver.session().last_summary().cloned();
    finished_tx.send_if_modified(|current| {
        if *current == latest {
            return false;
        }
        *current = latest;
        true
    });
}
