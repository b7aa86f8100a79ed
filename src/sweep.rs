//! The pass runner: scan loop, per-key dispatch, and error isolation.
//!
//! [`Sweep`] owns the whole pass-execution context — both store handles, the
//! resolved configuration, and the counters — so nothing about a pass lives
//! in global state. Keys are processed strictly one at a time; a handler
//! failure is logged with its key and operation and the scan moves on.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Operation, SweepConfig};
use crate::ops::{self, OpOutcome};
use crate::progress::RateReporter;
use crate::scan::KeyScanner;
use crate::store::{Store, StoreError};

/// Totals for one completed (or early-ended) pass.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SweepSummary {
    /// Keys returned by the scan.
    pub scanned: u64,
    /// Keys whose operation took effect.
    pub applied: u64,
    /// Keys their handler decided to leave alone.
    pub skipped: u64,
    /// Keys whose handler failed; failures are log-only.
    pub failed: u64,
    /// Wall-clock pass duration in seconds.
    pub elapsed_secs: f64,
}

/// One sequential pass over the source keyspace.
pub struct Sweep<S, D> {
    src: S,
    dst: D,
    config: SweepConfig,
}

impl<S: Store, D: Store> Sweep<S, D> {
    pub fn new(src: S, dst: D, config: SweepConfig) -> Self {
        Self { src, dst, config }
    }

    /// Run the pass to completion.
    ///
    /// Per-key errors are swallowed into the summary; an `Err` from here
    /// means the pass itself broke (a scan page could not be fetched) and
    /// cannot resume.
    pub async fn run(mut self) -> Result<SweepSummary, StoreError> {
        let started = Instant::now();
        let mut scanner = KeyScanner::new(self.config.scan_count);
        let mut reporter = RateReporter::new(self.config.progress_interval);
        let mut summary = SweepSummary::default();

        info!(
            "starting {} pass over database {} of {}:{}",
            self.config.op, self.config.src.db, self.config.src.host, self.config.src.port
        );

        while let Some(keys) = scanner.next_page(&mut self.src).await? {
            for key in keys {
                summary.scanned += 1;

                match ops::apply(&key, &mut self.src, &mut self.dst, &self.config).await {
                    Ok(OpOutcome::Applied) => summary.applied += 1,
                    Ok(OpOutcome::Skipped(reason)) => {
                        summary.skipped += 1;
                        if self.config.op == Operation::Del {
                            info!("del: kept key {} ({})", key, reason);
                        } else {
                            debug!("{}: skipped key {} ({})", self.config.op, key, reason);
                        }
                    }
                    Err(e) => {
                        summary.failed += 1;
                        warn!("{}: key {} failed: {}", self.config.op, key, e);
                    }
                }

                if let Some(report) = reporter.record() {
                    info!(
                        "processed {} keys ({:.0} keys/s over the last {} keys)",
                        report.total, report.rate, report.interval_keys
                    );
                }
            }
        }

        summary.elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            "pass complete: {} scanned, {} applied, {} skipped, {} failed in {:.1}s",
            summary.scanned, summary.applied, summary.skipped, summary.failed, summary.elapsed_secs
        );
        Ok(summary)
    }
}
