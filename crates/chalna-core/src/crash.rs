//! Crash reporting seam.
//!
//! Unexpected failures inside the engine (date arithmetic overflow, storage
//! that keeps failing after a retry) are handed to a [`CrashReporter`]
//! instead of propagating to the host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A report as recorded by [`MemoryCrashReporter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashReport {
    pub at: DateTime<Utc>,
    pub context: String,
    pub error: String,
}

pub trait CrashReporter: Send + Sync {
    fn report_crash(&self, context: &str, error: &dyn std::error::Error);
}

/// Logs reports through `tracing` and counts them.
#[derive(Debug, Default)]
pub struct TracingCrashReporter {
    reported: AtomicU64,
}

impl TracingCrashReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl CrashReporter for TracingCrashReporter {
    fn report_crash(&self, context: &str, error: &dyn std::error::Error) {
        self.reported.fetch_add(1, Ordering::Relaxed);
        tracing::error!(context, error = %error, "crash reported");
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemoryCrashReporter {
    reports: Mutex<Vec<CrashReport>>,
}

impl MemoryCrashReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<CrashReport> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl CrashReporter for MemoryCrashReporter {
    fn report_crash(&self, context: &str, error: &dyn std::error::Error) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(CrashReport {
                at: Utc::now(),
                context: context.to_string(),
                error: error.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalculationError;

    #[test]
    fn memory_reporter_records() {
        let reporter = MemoryCrashReporter::new();
        reporter.report_crash("countdown", &CalculationError::Overflow("working date"));
        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].context, "countdown");
        assert!(reports[0].error.contains("working date"));
    }

    #[test]
    fn tracing_reporter_counts() {
        let reporter = TracingCrashReporter::new();
        reporter.report_crash("storage", &CalculationError::Overflow("x"));
        assert_eq!(reporter.reported(), 1);
    }
}
