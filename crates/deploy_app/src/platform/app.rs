use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use deploy_core::{SessionOutcome, SessionSummary};
use deploy_engine::{DriverHandle, ReqwestDeployApi, SessionDriver};
use deploy_logging::{deploy_info, deploy_warn};

use super::cli::{Cli, Command};
use super::config::{self, AppConfig, Overrides};
use super::logging;
use super::persistence::{load_last_deployment, save_last_deployment, LastDeployment};
use super::render::{format_last_deployment, TerminalSink};

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.verbose);

    let config = config::load(cli.config.as_deref())?.resolve(Overrides {
        base_url: cli.base_url,
        nonce: cli.nonce,
    });

    if cli.command == Command::Last {
        show_last(&config.state_dir);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;
    runtime.block_on(execute(cli.command, config))
}

async fn execute(command: Command, config: AppConfig) -> anyhow::Result<()> {
    let api = ReqwestDeployApi::new(config.client.clone())
        .with_context(|| format!("using job runner at {}", config.client.base_url))?;
    let sink = Arc::new(TerminalSink::new(std::io::stdout()));
    let driver = SessionDriver::new(Arc::new(api), sink.clone(), sink, config.driver.clone());
    let mut handle = DriverHandle::spawn(driver);

    let result = dispatch(&mut handle, command, &config).await;
    handle
        .shutdown()
        .await
        .context("stopping the session driver")?;
    result
}

async fn dispatch(
    handle: &mut DriverHandle,
    command: Command,
    config: &AppConfig,
) -> anyhow::Result<()> {
    match command {
        Command::Deploy => {
            handle.start().await.context("starting the deployment")?;
            follow(handle, &config.state_dir).await
        }
        Command::Watch => {
            let attached = handle
                .attach_if_running()
                .await
                .context("checking for a running deployment")?;
            if !attached {
                println!("No deployment is running.");
                return Ok(());
            }
            follow(handle, &config.state_dir).await
        }
        Command::Cancel => {
            let attached = handle
                .attach_if_running()
                .await
                .context("checking for a running deployment")?;
            if !attached {
                println!("No deployment is running.");
                return Ok(());
            }
            handle.cancel().await.context("cancelling the deployment")
        }
        Command::ForceStop => handle.force_stop().await.context("force stopping"),
        Command::DownloadLog { dir } => {
            let saved = handle
                .download_log(dir.clone())
                .await
                .with_context(|| format!("downloading the log into {}", dir.display()))?;
            if let Some(path) = saved {
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::Last => {
            show_last(&config.state_dir);
            Ok(())
        }
    }
}

/// Waits for the session to end, cancelling it on Ctrl-C, then records how it ended.
async fn follow(handle: &mut DriverHandle, state_dir: &Path) -> anyhow::Result<()> {
    let finished = tokio::select! {
        summary = handle.finished() => Some(summary.context("following the deployment")?),
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl-C")?;
            None
        }
    };

    let summary = match finished {
        Some(summary) => summary,
        None => interrupt(handle).await?,
    };

    save_last_deployment(
        state_dir,
        &LastDeployment::from_summary(&summary, Local::now()),
    );
    deploy_info!("deployment ended: {}", summary.outcome.as_str());

    match summary.outcome {
        SessionOutcome::Completed => Ok(()),
        outcome => anyhow::bail!("deployment {}", outcome.as_str()),
    }
}

async fn interrupt(handle: &mut DriverHandle) -> anyhow::Result<SessionSummary> {
    // The job may have ended between the signal and the cancel; its own
    // outcome is then what `finished` reports.
    if let Err(err) = handle.cancel().await {
        deploy_warn!("cancel after Ctrl-C was refused: {}", err);
    }
    handle
        .finished()
        .await
        .context("waiting for the cancelled deployment")
}

fn show_last(state_dir: &Path) {
    match load_last_deployment(state_dir) {
        Some(last) => print!("{}", format_last_deployment(&last, Local::now())),
        None => println!("No deployment recorded yet."),
    }
}
