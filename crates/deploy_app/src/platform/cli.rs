use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "deploy-tracker", version, about = "Follow static-site deployments from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// RON configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// REST root of the job runner. Overrides the config file.
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Request nonce. Overrides the config file.
    #[arg(long, global = true)]
    pub nonce: Option<String>,

    /// Log at debug level.
    #[arg(long, short = 'v', default_value_t = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a deployment and follow it until it ends. Ctrl-C cancels it.
    Deploy,
    /// Follow a deployment that is already running.
    Watch,
    /// Cancel the running deployment.
    Cancel,
    /// Clear every lock on the server, running or not.
    ForceStop,
    /// Save the complete server log to a file.
    DownloadLog {
        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
    /// Show how the last followed deployment ended.
    Last,
}
