use deploy_core::TailCursor;
use deploy_logging::deploy_warn;

use crate::{DeployApi, TailBatch};

/// Fetches the lines after `cursor`, in ascending offset order.
///
/// A failed request is logged and reported as `None`; the caller retries on
/// the next tick from the same cursor.
pub async fn fetch_tail(api: &dyn DeployApi, cursor: TailCursor, max_lines: u32) -> Option<TailBatch> {
    match api.tail_log(cursor.since(), max_lines).await {
        Ok(mut batch) => {
            batch.lines.sort_by_key(|line| line.offset);
            Some(batch)
        }
        Err(err) => {
            deploy_warn!("log tail since {} failed: {}", cursor.since(), err);
            None
        }
    }
}
