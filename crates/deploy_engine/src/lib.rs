//! Deploy tracker engine: job-runner client, sinks and session driving.
mod client;
mod driver;
mod filename;
mod handle;
mod persist;
mod sink;
mod tail;
mod types;

pub use client::{ClientSettings, DeployApi, ReqwestDeployApi, NONCE_HEADER};
pub use driver::{DriverSettings, SessionDriver};
pub use filename::debug_log_filename;
pub use handle::DriverHandle;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use sink::{ChannelSink, LogSink, StatusSink, UiEvent};
pub use tail::fetch_tail;
pub use types::{
    ApiError, DriverError, FailureKind, FullLog, RcloneStatus, StartResponse, TailBatch,
};
