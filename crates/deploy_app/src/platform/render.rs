//! Plain-text rendering of log entries, stage icons and progress.

use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, Local, TimeDelta};
use deploy_core::{Category, SessionSummary, Stage, StageState};
use deploy_engine::{LogSink, StatusSink};

use super::persistence::LastDeployment;

const BAR_WIDTH: usize = 20;

pub fn stage_icon(state: StageState) -> &'static str {
    match state {
        StageState::Pending => "⏳",
        StageState::InProgress => "🔄",
        StageState::Completed => "✅",
        StageState::Failed => "⚠️",
        StageState::Skipped => "⏭️",
    }
}

pub fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Setup => "Setup",
        Stage::Discover => "Discover URLs",
        Stage::Export => "Export pages",
        Stage::R2 => "Upload to R2",
        Stage::Github => "Push to GitHub",
        Stage::Pages => "Deploy to CF Pages",
        Stage::Wrapup => "Wrap up",
    }
}

/// `(p/t URLs)`, or nothing until a total is known.
pub fn url_counter(processed: u32, total: u32) -> Option<String> {
    (total > 0).then(|| format!("({processed}/{total} URLs)"))
}

pub fn format_progress(percent: u8, label: &str) -> String {
    let percent = percent.min(100);
    let filled = usize::from(percent) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        percent,
        label
    )
}

pub fn format_log_entry(category: Category, text: &str, timestamp: DateTime<Local>) -> String {
    format!(
        "{} {:<9} {}",
        timestamp.format("%H:%M:%S"),
        format!("[{}]", category.as_str()),
        text
    )
}

pub fn format_stage_row(stage: Stage, state: StageState) -> String {
    format!("  {} {}", stage_icon(state), stage_label(stage))
}

pub fn time_ago(elapsed: TimeDelta) -> String {
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();
    if minutes < 1 {
        "just now".to_string()
    } else if hours < 1 {
        plural(minutes, "minute")
    } else if days < 1 {
        plural(hours, "hour")
    } else {
        plural(days, "day")
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

pub fn format_last_deployment(last: &LastDeployment, now: DateTime<Local>) -> String {
    let mut out = format!(
        "Last Deployment ({}, {})\n",
        last.outcome.as_str(),
        time_ago(now - last.finished_at)
    );
    for (stage, state) in last.stages.iter() {
        out.push_str(&format_stage_row(stage, state));
        out.push('\n');
    }
    if let Some(counter) = url_counter(last.url_progress.processed, last.url_progress.total) {
        out.push_str(&format!("  {counter}\n"));
    }
    out
}

/// Prints every sink call as one line on `W`.
pub struct TerminalSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn print(&self, line: &str) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Nowhere left to report a broken terminal.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

impl<W: Write + Send> LogSink for TerminalSink<W> {
    fn append(&self, category: Category, text: &str, timestamp: DateTime<Local>) {
        self.print(&format_log_entry(category, text, timestamp));
    }

    fn clear(&self) {
        self.print("---- log cleared ----");
    }
}

impl<W: Write + Send> StatusSink for TerminalSink<W> {
    fn set_stage_status(&self, stage: Stage, state: StageState) {
        // Start resets every row to pending; only movement is worth a line.
        if state != StageState::Pending {
            self.print(&format_stage_row(stage, state));
        }
    }

    fn set_progress(&self, percent: u8, label: &str) {
        self.print(&format_progress(percent, label));
    }

    fn set_url_progress(&self, processed: u32, total: u32) {
        if let Some(counter) = url_counter(processed, total) {
            self.print(&format!("  {counter}"));
        }
    }

    fn session_finalized(&self, summary: &SessionSummary) {
        self.print(&format!("Deployment {}", summary.outcome.as_str()));
        for (stage, state) in summary.stages.iter() {
            self.print(&format_stage_row(stage, state));
        }
    }
}
