//! Everything that touches the terminal, the filesystem or the process.
mod app;
mod cli;
mod config;
mod logging;
mod persistence;
mod render;

pub use app::run;
