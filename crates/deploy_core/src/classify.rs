//! Log line classification.
//!
//! A line is mapped to a display [`Category`] by an ordered rule table (first
//! match wins), and independently scanned for stage signals, URL figures and
//! the job-finished marker. Nothing here keeps state.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::cursor::LogLine;
use crate::progress::{Counter, UrlUpdate};
use crate::stage::{Stage, StageSignal};

static RE_DISCOVERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Discovery complete:\s*(\d+)\s*total").unwrap());
static RE_FRACTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").unwrap());
static RE_PAGES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Total pages:\s*(\d+).*Pages remaining:\s*(\d+)").unwrap()
});
static RE_PAGES_DRAINED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Pages remaining:\s*0(?:\D|$)").unwrap());

const NOISE_MARKERS: &[&str] = &["[internal]", "Stack trace"];
const FINISHED_MARKERS: &[&str] = &["[done] Done!", "Finished in"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Info,
    Success,
    Error,
    Warning,
    Crawl,
    Redirect,
    R2,
    Github,
    Pages,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Info => "info",
            Category::Success => "success",
            Category::Error => "error",
            Category::Warning => "warning",
            Category::Crawl => "crawl",
            Category::Redirect => "redirect",
            Category::R2 => "r2",
            Category::Github => "github",
            Category::Pages => "pages",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct CategoryRule {
    category: Category,
    markers: &'static [&'static str],
    /// Counter bumped when this rule wins and the line also carries the marker.
    counter: Option<(Counter, &'static str)>,
}

const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: Category::Error,
        markers: &["❌", "Error", "Failed"],
        counter: None,
    },
    CategoryRule {
        category: Category::Success,
        markers: &["✅", "Fetched:", "complete", "Success"],
        counter: Some((Counter::Crawl, "Fetched:")),
    },
    CategoryRule {
        category: Category::Crawl,
        markers: &["🔍", "Crawling:"],
        counter: None,
    },
    CategoryRule {
        category: Category::Warning,
        markers: &["⏭️", "Skipped"],
        counter: None,
    },
    CategoryRule {
        category: Category::Redirect,
        markers: &["↪️", "Redirect"],
        counter: None,
    },
    CategoryRule {
        category: Category::R2,
        markers: &["📤", "R2:", "Uploading to R2"],
        counter: Some((Counter::R2, "Uploaded")),
    },
    CategoryRule {
        category: Category::Github,
        markers: &["🐙", "GitHub:"],
        counter: Some((Counter::Github, "Pushed")),
    },
    CategoryRule {
        category: Category::Pages,
        markers: &["🌐", "Pages:"],
        counter: Some((Counter::Pages, "Triggered")),
    },
    CategoryRule {
        category: Category::Info,
        markers: &["🔗", "Found"],
        counter: None,
    },
    // Local-disk staging for the object store upload.
    CategoryRule {
        category: Category::R2,
        markers: &["📁", "rclone"],
        counter: None,
    },
];

struct SignalRule {
    /// Service prefix the line must also carry, e.g. `"R2:"`.
    scope: Option<&'static str>,
    markers: &'static [&'static str],
    signals: &'static [StageSignal],
}

const SIGNAL_RULES: &[SignalRule] = &[
    SignalRule {
        scope: None,
        markers: &["Setting up export", "Creating archive directory", "Cleaning temp files"],
        signals: &[StageSignal::in_progress(Stage::Setup)],
    },
    SignalRule {
        scope: None,
        markers: &["URL discovery", "Discovering", "Fetching URLs", "fetch_urls"],
        signals: &[StageSignal::completed(Stage::Setup)],
    },
    SignalRule {
        scope: None,
        markers: &["URL discovery", "Discovering"],
        signals: &[StageSignal::in_progress(Stage::Discover)],
    },
    SignalRule {
        scope: None,
        markers: &["Wrapping up", "Cleaning temporary"],
        signals: &[StageSignal::in_progress(Stage::Wrapup)],
    },
    SignalRule {
        scope: None,
        markers: &["Export completed successfully"],
        signals: &[StageSignal::completed(Stage::Wrapup)],
    },
    SignalRule {
        scope: Some("R2:"),
        markers: &["Starting", "rclone", "Uploading"],
        signals: &[StageSignal::in_progress(Stage::R2)],
    },
    // Uploading cannot begin before the fetch finished.
    SignalRule {
        scope: Some("R2:"),
        markers: &[
            "Upload complete",
            "rclone bulk upload completed",
            "rclone upload successful",
        ],
        signals: &[
            StageSignal::completed(Stage::R2),
            StageSignal::completed(Stage::Export),
        ],
    },
    SignalRule {
        scope: Some("GitHub:"),
        markers: &["Pushing", "Committing", "blob"],
        signals: &[StageSignal::in_progress(Stage::Github)],
    },
    SignalRule {
        scope: Some("GitHub:"),
        markers: &["Push complete"],
        signals: &[StageSignal::completed(Stage::Github)],
    },
    SignalRule {
        scope: Some("Pages:"),
        markers: &["Triggered", "Deploying", "Building"],
        signals: &[StageSignal::in_progress(Stage::Pages)],
    },
    SignalRule {
        scope: Some("Pages:"),
        markers: &["Auto-deploy started", "push complete"],
        signals: &[StageSignal::completed(Stage::Pages)],
    },
];

/// Everything a single line says about the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub signals: Vec<StageSignal>,
    pub url_updates: Vec<UrlUpdate>,
    pub counter: Option<Counter>,
    /// The line mentions a fetched page; together with an exhausted URL
    /// count this completes the export stage.
    pub mentions_fetched: bool,
    pub job_finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub line: LogLine,
    pub classification: Classification,
}

/// Internal diagnostics, stack traces and blank lines never reach the pipeline.
pub fn is_noise(text: &str) -> bool {
    text.trim().is_empty() || contains_any(text, NOISE_MARKERS)
}

/// Classifies one line of log text; `None` means the line is dropped.
pub fn classify(text: &str) -> Option<Classification> {
    if is_noise(text) {
        return None;
    }

    let (category, counter) = categorize(text);
    let mut signals = Vec::new();
    let mut url_updates = Vec::new();

    if let Some(total) = RE_DISCOVERY.captures(text).and_then(|c| number(&c, 1)) {
        url_updates.push(UrlUpdate::Discovered { total });
        signals.push(StageSignal::completed(Stage::Discover));
    }
    if let Some(caps) = RE_FRACTION.captures(text) {
        if let (Some(processed), Some(total)) = (number(&caps, 1), number(&caps, 2)) {
            url_updates.push(UrlUpdate::Fraction { processed, total });
            signals.push(StageSignal::in_progress(Stage::Export));
        }
    }
    if let Some(caps) = RE_PAGES.captures(text) {
        if let (Some(total), Some(remaining)) = (number(&caps, 1), number(&caps, 2)) {
            url_updates.push(UrlUpdate::Remaining { total, remaining });
        }
    }
    if RE_PAGES_DRAINED.is_match(text) {
        signals.push(StageSignal::completed(Stage::Export));
    }

    for rule in SIGNAL_RULES {
        let in_scope = rule.scope.is_none_or(|scope| text.contains(scope));
        if in_scope && contains_any(text, rule.markers) {
            signals.extend_from_slice(rule.signals);
        }
    }

    Some(Classification {
        category,
        signals,
        url_updates,
        counter,
        mentions_fetched: text.contains("Fetched"),
        job_finished: contains_any(text, FINISHED_MARKERS),
    })
}

/// Classifies a tailed line, keeping it attached to the result.
pub fn classify_line(line: LogLine) -> Option<ClassifiedEvent> {
    let classification = classify(&line.text)?;
    Some(ClassifiedEvent {
        line,
        classification,
    })
}

fn categorize(text: &str) -> (Category, Option<Counter>) {
    CATEGORY_RULES
        .iter()
        .find(|rule| contains_any(text, rule.markers))
        .map(|rule| {
            let counter = rule
                .counter
                .filter(|(_, marker)| text.contains(marker))
                .map(|(counter, _)| counter);
            (rule.category, counter)
        })
        .unwrap_or((Category::Info, None))
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.contains(marker))
}

fn number(caps: &regex::Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_dropped() {
        assert_eq!(classify("PHP Warning [internal] foo"), None);
        assert_eq!(classify("Stack trace: #0 ..."), None);
        assert_eq!(classify("   "), None);
    }

    #[test]
    fn error_outranks_success() {
        let c = classify("❌ Upload complete with Error").unwrap();
        assert_eq!(c.category, Category::Error);
    }

    #[test]
    fn fetched_line_counts_as_crawl() {
        let c = classify("(87/136) Fetched: https://example.com/about/").unwrap();
        assert_eq!(c.category, Category::Success);
        assert_eq!(c.counter, Some(Counter::Crawl));
        assert!(c.mentions_fetched);
    }

    #[test]
    fn service_counters_need_their_verb() {
        assert_eq!(classify("R2: Uploaded logo.png").unwrap().counter, Some(Counter::R2));
        assert_eq!(classify("R2: Starting sync").unwrap().counter, None);
        assert_eq!(
            classify("GitHub: Pushed 12 files").unwrap().counter,
            Some(Counter::Github)
        );
        assert_eq!(
            classify("Pages: Triggered build").unwrap().counter,
            Some(Counter::Pages)
        );
    }

    #[test]
    fn unmatched_text_is_info_without_signals() {
        let c = classify("something unexpected happened").unwrap();
        assert_eq!(c.category, Category::Info);
        assert!(c.signals.is_empty());
        assert!(c.url_updates.is_empty());
        assert!(!c.job_finished);
    }

    #[test]
    fn rclone_falls_back_to_r2() {
        assert_eq!(classify("📁 rclone staging dir ready").unwrap().category, Category::R2);
        assert_eq!(classify("Found rclone config").unwrap().category, Category::Info);
    }

    #[test]
    fn drained_marker_needs_exact_zero() {
        let c = classify("Total pages: 94; Pages remaining: 0").unwrap();
        assert!(c.signals.contains(&StageSignal::completed(Stage::Export)));
        let c = classify("Total pages: 94; Pages remaining: 05").unwrap();
        assert!(!c.signals.contains(&StageSignal::completed(Stage::Export)));
    }

    #[test]
    fn service_markers_require_their_prefix() {
        let c = classify("Push complete").unwrap();
        assert!(c.signals.is_empty());
    }

    #[test]
    fn classified_line_keeps_its_offset() {
        let event = classify_line(LogLine::new(42, "Discovery complete: 134 total URLs found")).unwrap();
        assert_eq!(event.line.offset, 42);
        assert_eq!(
            event.classification.url_updates,
            vec![UrlUpdate::Discovered { total: 134 }]
        );
        assert!(classify_line(LogLine::new(43, "Stack trace: #1")).is_none());
    }

    #[test]
    fn finished_markers() {
        assert!(classify("[done] Done!").unwrap().job_finished);
        assert!(classify("Finished in 00:03:12").unwrap().job_finished);
    }
}
