//! Periodic throughput reporting.
//!
//! The reporter owns the pass counters: the lifetime total and the count of
//! keys since the last report. Every processed key is [`RateReporter::record`]ed;
//! whenever the configured interval divides the running total, a
//! [`RateReport`] comes back for the runner to log, and the interval counter
//! and timestamp reset.

use std::time::Instant;

use serde::Serialize;

/// A point-in-time throughput report.
#[derive(Clone, Debug, Serialize)]
pub struct RateReport {
    /// Keys processed since the pass started.
    pub total: u64,
    /// Keys processed since the previous report.
    pub interval_keys: u64,
    /// Instantaneous throughput in keys per second. [`f64::INFINITY`] when
    /// the interval elapsed in less than the clock's resolution.
    pub rate: f64,
}

/// Counter state for periodic rate reports.
pub struct RateReporter {
    interval: Option<u64>,
    total: u64,
    since_last: u64,
    last_report: Instant,
}

impl RateReporter {
    /// `interval: None` disables reporting; counting still happens.
    pub fn new(interval: Option<u64>) -> Self {
        Self {
            interval,
            total: 0,
            since_last: 0,
            last_report: Instant::now(),
        }
    }

    /// Keys processed since the pass started.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Keys processed since the last report.
    pub fn since_last(&self) -> u64 {
        self.since_last
    }

    /// Count one processed key. Returns a report when the interval divides
    /// the running total.
    pub fn record(&mut self) -> Option<RateReport> {
        self.total += 1;
        self.since_last += 1;

        let interval = self.interval?;
        if self.total % interval != 0 {
            return None;
        }

        let elapsed = self.last_report.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.since_last as f64 / elapsed
        } else {
            f64::INFINITY
        };

        let report = RateReport {
            total: self.total,
            interval_keys: self.since_last,
            rate,
        };
        self.since_last = 0;
        self.last_report = Instant::now();
        Some(report)
    }
}
