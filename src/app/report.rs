//! Per-URL result lines and the end-of-run summary.

use std::fmt;
use std::path::Path;

use image_fetcher_core::FetchOutcome;

/// Formats the line printed after `[i/n] url`.
pub(crate) fn outcome_line(outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Saved { path, size, .. } => {
            let name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            format!("saved {name} ({size} bytes)")
        }
        FetchOutcome::Duplicate(record) => format!("duplicate of {}", record.filename),
        FetchOutcome::Rejected(reason) => format!("rejected ({})", reason.kind()),
        FetchOutcome::NetworkError(message) => format!("network error: {message}"),
    }
}

/// Counts of each outcome over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub saved: usize,
    pub duplicate: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl RunSummary {
    pub(crate) fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Saved { .. } => self.saved += 1,
            FetchOutcome::Duplicate(_) => self.duplicate += 1,
            FetchOutcome::Rejected(_) => self.rejected += 1,
            FetchOutcome::NetworkError(_) => self.failed += 1,
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.saved + self.duplicate + self.rejected + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Saved: {}  Duplicate: {}  Rejected: {}  Failed: {}",
            self.saved, self.duplicate, self.rejected, self.failed
        )
    }
}

/// Output directory as an absolute path for display.
pub(crate) fn display_dir(dir: &Path) -> String {
    std::path::absolute(dir)
        .unwrap_or_else(|_| dir.to_path_buf())
        .display()
        .to_string()
}
