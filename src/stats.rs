//! Per-translation statistics.
//!
//! A [`Statistics`] record is owned by its compiled translation and updated concurrently by
//! file tasks through atomic counters. [`TranslationReport`] is the immutable snapshot handed
//! back to callers once a run completes.

use std::{
    path::PathBuf,
    sync::{
        OnceLock,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use serde::Serialize;
use serde_json::json;

/// Why a translation did not touch any file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The activation expression evaluated to false or failed to evaluate.
    Condition,
    /// The configured locale is not admitted by the translation's locale filter.
    Locale,
}

impl SkipReason {
    fn as_str(self) -> &'static str {
        match self {
            SkipReason::Condition => "inactive condition",
            SkipReason::Locale => "locale filtered",
        }
    }
}

/// What the scheduler did with a translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum Disposition {
    Processed,
    Skipped(SkipReason),
    Added(PathBuf),
}

#[derive(Debug, Default)]
pub struct Statistics {
    patterns: usize,
    files: AtomicUsize,
    unmatched_lines: AtomicUsize,
    elapsed_nanos: AtomicU64,
    disposition: OnceLock<Disposition>,
}

impl Statistics {
    pub fn new(patterns: usize) -> Self {
        Statistics {
            patterns,
            ..Default::default()
        }
    }

    pub fn patterns(&self) -> usize {
        self.patterns
    }

    pub fn files(&self) -> usize {
        self.files.load(Ordering::Relaxed)
    }

    pub fn unmatched_lines(&self) -> usize {
        self.unmatched_lines.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Relaxed))
    }

    pub fn disposition(&self) -> Option<&Disposition> {
        self.disposition.get()
    }

    pub(crate) fn record_file(&self) {
        self.files.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unmatched(&self, lines: usize) {
        self.unmatched_lines.fetch_add(lines, Ordering::Relaxed);
    }

    pub(crate) fn record_elapsed(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.store(nanos, Ordering::Relaxed);
    }

    /// First write wins.
    pub(crate) fn record_disposition(&self, disposition: Disposition) {
        let _ = self.disposition.set(disposition);
    }
}

/// Snapshot of one translation's statistics after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationReport {
    pub id: usize,
    pub label: Option<String>,
    pub disposition: Disposition,
    pub files: usize,
    pub patterns: usize,
    pub unmatched_lines: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl TranslationReport {
    pub fn from_statistics(id: usize, label: Option<String>, stats: &Statistics) -> Self {
        TranslationReport {
            id,
            label,
            disposition: stats
                .disposition()
                .cloned()
                .unwrap_or(Disposition::Processed),
            files: stats.files(),
            patterns: stats.patterns(),
            unmatched_lines: stats.unmatched_lines(),
            elapsed: stats.elapsed(),
        }
    }

    /// Human-readable one-line summary, e.g.
    /// `[1] (**/*.js): processed 3 files for 2 patterns in 1.20ms`.
    pub fn summary(&self) -> String {
        let name = match self.label.as_deref() {
            Some(label) if !label.is_empty() => format!(" ({})", label),
            _ => String::new(),
        };
        match &self.disposition {
            Disposition::Skipped(reason) => {
                format!("[{}]{}: skipped ({})", self.id, name, reason.as_str())
            }
            Disposition::Added(path) => format!(
                "[{}]{}: added {} in {:.2?}",
                self.id,
                name,
                path.display(),
                self.elapsed
            ),
            Disposition::Processed => {
                let mut line = format!(
                    "[{}]{}: processed {} files for {} patterns in {:.2?}",
                    self.id, name, self.files, self.patterns, self.elapsed
                );
                if self.unmatched_lines > 0 {
                    line.push_str(&format!(" ({} unmatched lines)", self.unmatched_lines));
                }
                line
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "label": self.label,
            "disposition": self.disposition,
            "files": self.files,
            "patterns": self.patterns,
            "unmatched_lines": self.unmatched_lines,
            "elapsed_ms": (self.elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0,
        })
    }
}
