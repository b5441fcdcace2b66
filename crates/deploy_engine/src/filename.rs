use chrono::{DateTime, TimeZone};

/// `deploy-debug-YYYY-MM-DDTHH-MM-SS.txt`; colons are not portable in filenames.
pub fn debug_log_filename<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("deploy-debug-{}.txt", at.format("%Y-%m-%dT%H-%M-%S"))
}
