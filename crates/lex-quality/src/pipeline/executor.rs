//! Detector execution.
//!
//! Runs the detector set over a shared [`DetectionContext`], either on
//! scoped worker threads or one after another, and assembles the outputs
//! into a [`ResultStore`] in detector order.

use crate::detectors::{DetectionContext, Detector};
use crate::error::{QualityError, Result};
use crate::pipeline::progress::{CancellationToken, ProgressUpdate, QualityStage};
use crate::reporting::ResultStore;
use crate::types::RowSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Executes a fixed list of detectors.
pub struct DetectorExecutor<'a> {
    detectors: &'a [Detector],
    parallel: bool,
    cancellation_token: &'a CancellationToken,
    on_progress: &'a (dyn Fn(ProgressUpdate) + Sync),
}

impl<'a> DetectorExecutor<'a> {
    pub fn new(
        detectors: &'a [Detector],
        parallel: bool,
        cancellation_token: &'a CancellationToken,
        on_progress: &'a (dyn Fn(ProgressUpdate) + Sync),
    ) -> Self {
        Self {
            detectors,
            parallel,
            cancellation_token,
            on_progress,
        }
    }

    /// Run every detector. The first failure in detector order wins.
    pub fn run(&self, ctx: &DetectionContext<'_>) -> Result<ResultStore> {
        let outcomes = if self.parallel && self.detectors.len() > 1 {
            self.run_parallel(ctx)
        } else {
            self.run_sequential(ctx)
        };

        let mut entries = Vec::with_capacity(outcomes.len());
        for (detector, outcome) in self.detectors.iter().zip(outcomes) {
            entries.push((detector.issue_type(), outcome?));
        }
        Ok(ResultStore::from_entries(entries))
    }

    fn run_sequential(&self, ctx: &DetectionContext<'_>) -> Vec<Result<RowSet>> {
        let finished = AtomicUsize::new(0);
        let mut outcomes = Vec::with_capacity(self.detectors.len());
        for detector in self.detectors {
            if self.cancellation_token.is_cancelled() {
                outcomes.push(Err(QualityError::Cancelled));
                break;
            }
            let outcome = self.run_one(*detector, ctx, &finished);
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        outcomes
    }

    fn run_parallel(&self, ctx: &DetectionContext<'_>) -> Vec<Result<RowSet>> {
        let finished = AtomicUsize::new(0);
        std::thread::scope(|s| {
            let handles: Vec<_> = self
                .detectors
                .iter()
                .map(|detector| {
                    let finished = &finished;
                    s.spawn(move || self.run_one(*detector, ctx, finished))
                })
                .collect();

            handles
                .into_iter()
                .zip(self.detectors)
                .map(|(handle, detector)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(QualityError::Internal(format!(
                            "detector '{}' panicked",
                            detector
                        )))
                    })
                })
                .collect()
        })
    }

    fn run_one(
        &self,
        detector: Detector,
        ctx: &DetectionContext<'_>,
        finished: &AtomicUsize,
    ) -> Result<RowSet> {
        let start = Instant::now();
        let outcome = detector.detect(ctx);

        let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
        match &outcome {
            Ok(rows) => {
                info!(
                    "Detector '{}' flagged {} rows in {:?}",
                    detector,
                    rows.len(),
                    start.elapsed()
                );
                (self.on_progress)(ProgressUpdate::with_items(
                    QualityStage::Detection,
                    format!("Detector: {}", detector),
                    done,
                    self.detectors.len(),
                    format!("{} flagged {} rows", detector, rows.len()),
                ));
            }
            Err(e) => debug!("Detector '{}' stopped: {}", detector, e),
        }
        outcome
    }
}
