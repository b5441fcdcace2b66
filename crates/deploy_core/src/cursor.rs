/// One line of the remote log. Offsets are strictly increasing within a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub offset: u64,
    pub text: String,
}

impl LogLine {
    pub fn new(offset: u64, text: impl Into<String>) -> Self {
        Self {
            offset,
            text: text.into(),
        }
    }
}

/// How much of the remote log has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TailCursor {
    offset: u64,
}

impl TailCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset to pass as `since` on the next fetch.
    pub fn since(&self) -> u64 {
        self.offset
    }

    /// Moves to the highest offset in `batch`. Never moves backwards; an
    /// empty batch is a no-op.
    pub fn advance(&mut self, batch: &[LogLine]) -> bool {
        match batch.iter().map(|line| line.offset).max() {
            Some(max) if max > self.offset => {
                self.offset = max;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }
}
