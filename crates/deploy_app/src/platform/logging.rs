//! Logger setup for the deploy-tracker binary.
//!
//! Diagnostics go to `./deploy_tracker.log`. Deployment output itself is
//! printed by the renderer, so the terminal logger only shows warnings unless
//! `--verbose` is given.

use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILENAME: &str = "./deploy_tracker.log";

pub fn initialize(verbose: bool) {
    let file_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let term_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(file_logger) = create_file_logger(file_level, config) {
        loggers.push(file_logger);
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    let log_path = PathBuf::from(LOG_FILENAME);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
