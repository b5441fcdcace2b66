/// Percent shown while the job is still running.
pub const ESTIMATE_CAP: u8 = 98;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Crawl,
    R2,
    Github,
    Pages,
}

/// Activity counters; they only ever grow within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryCounters {
    pub crawl: u32,
    pub r2: u32,
    pub github: u32,
    pub pages: u32,
}

impl CategoryCounters {
    pub fn increment(&mut self, counter: Counter) {
        let slot = match counter {
            Counter::Crawl => &mut self.crawl,
            Counter::R2 => &mut self.r2,
            Counter::Github => &mut self.github,
            Counter::Pages => &mut self.pages,
        };
        *slot = slot.saturating_add(1);
    }
}

/// A URL figure parsed out of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlUpdate {
    /// "Discovery complete: N total"
    Discovered { total: u32 },
    /// "(P/T)"
    Fraction { processed: u32, total: u32 },
    /// "Total pages: T; Pages remaining: R"
    Remaining { total: u32, remaining: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UrlProgress {
    pub processed: u32,
    pub total: u32,
}

impl UrlProgress {
    /// Applies an update; returns true if anything changed.
    ///
    /// `total` never shrinks. `processed` never shrinks either, except when
    /// discovery restarts the count or a "remaining" figure recomputes it.
    pub fn apply(&mut self, update: UrlUpdate) -> bool {
        let before = *self;
        match update {
            UrlUpdate::Discovered { total } => {
                self.total = self.total.max(total);
                self.processed = 0;
            }
            UrlUpdate::Fraction { processed, total } => {
                self.total = self.total.max(total);
                self.processed = self.processed.max(processed);
            }
            UrlUpdate::Remaining { total, remaining } => {
                self.total = self.total.max(total);
                self.processed = total.saturating_sub(remaining);
            }
        }
        *self != before
    }

    pub fn is_exhausted(&self) -> bool {
        self.total > 0 && self.processed >= self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub label: String,
}

impl Progress {
    pub fn new(percent: u8, label: impl Into<String>) -> Self {
        Self {
            percent,
            label: label.into(),
        }
    }
}

/// Raw estimate from counters alone, already capped at [`ESTIMATE_CAP`].
pub fn estimate(counters: &CategoryCounters) -> Progress {
    let (percent, label) = if counters.pages > 0 {
        (95, "Cloudflare Pages: Building...".to_string())
    } else if counters.github > 0 {
        (
            70 + counters.github.min(20),
            format!("GitHub: Pushing files ({} processed)", counters.github),
        )
    } else if counters.r2 > 0 {
        (
            40 + counters.r2.min(25),
            format!("R2: Uploading images ({} processed)", counters.r2),
        )
    } else if counters.crawl > 0 {
        (
            10 + (counters.crawl / 2).min(25),
            format!("Crawling pages ({} found)", counters.crawl),
        )
    } else {
        (10, "Processing...".to_string())
    };
    // Every branch is bounded by 95.
    let percent = u8::try_from(percent).unwrap_or(ESTIMATE_CAP);
    Progress::new(percent.min(ESTIMATE_CAP), label)
}

/// Keeps the reported percent monotonic within a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressEstimator {
    last: Option<Progress>,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Progress> {
        self.last.as_ref()
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Forces a milestone value (session start, attach). Lower values than
    /// the last report are raised to it.
    pub fn seed(&mut self, percent: u8, label: &str) -> Progress {
        let percent = self.floor().max(percent.min(ESTIMATE_CAP));
        let progress = Progress::new(percent, label);
        self.last = Some(progress.clone());
        progress
    }

    /// Recomputes from counters; returns a report only when it differs from
    /// the previous one.
    pub fn advance(&mut self, counters: &CategoryCounters) -> Option<Progress> {
        let mut next = estimate(counters);
        next.percent = next.percent.max(self.floor());
        if self.last.as_ref() == Some(&next) {
            return None;
        }
        self.last = Some(next.clone());
        Some(next)
    }

    pub fn finalize(&mut self) -> Progress {
        let done = Progress::new(100, "✅ Deployment complete!");
        self.last = Some(done.clone());
        done
    }

    fn floor(&self) -> u8 {
        self.last.as_ref().map_or(0, |p| p.percent)
    }
}
