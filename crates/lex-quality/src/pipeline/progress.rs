//! Progress reporting and cancellation support for the quality pipeline.
//!
//! A run moves through a fixed sequence of [`QualityStage`]s. Callers observe
//! it through a [`ProgressReporter`] and may stop it from another thread with
//! a [`CancellationToken`].
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_quality::{CancellationToken, QualityPipeline};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token_clone.cancel();
//! });
//!
//! let report = QualityPipeline::builder()
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.stage, update.message);
//!     })
//!     .build()?
//!     .run(&df);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of a quality run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStage {
    /// Validating configuration against the dataset
    Initializing,
    /// Computing derived per-record attributes
    Preprocessing,
    /// Running the detectors
    Detection,
    /// Building the summary table
    Aggregation,
    /// Assigning severities and the quality score
    Scoring,
    Complete,
    Cancelled,
    Failed,
}

impl QualityStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Preprocessing => "Deriving Attributes",
            Self::Detection => "Detecting Issues",
            Self::Aggregation => "Summarizing",
            Self::Scoring => "Scoring Severity",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the whole run spent in this stage. The working stages sum
    /// to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.05,
            Self::Preprocessing => 0.20,
            Self::Detection => 0.65,
            Self::Aggregation => 0.05,
            Self::Scoring => 0.05,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Preprocessing => 0.05,
            Self::Detection => 0.25,
            Self::Aggregation => 0.90,
            Self::Scoring => 0.95,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// A single progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: QualityStage,

    /// Finer-grained position inside the stage (e.g. "Detector: duplicates")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: QualityStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        Self {
            stage,
            sub_stage: None,
            progress: (stage.base_progress() + stage.weight() * stage_progress).clamp(0.0, 1.0),
            stage_progress,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Progress through `current` of `total` items of a stage.
    pub fn with_items(
        stage: QualityStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(stage, stage_progress, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::terminal(QualityStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::terminal(QualityStage::Cancelled, 0.0, "Quality run cancelled by user")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::terminal(QualityStage::Failed, 0.0, message)
    }

    fn terminal(stage: QualityStage, progress: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            sub_stage: None,
            progress,
            stage_progress: progress,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }
}

/// Receives progress updates from a running pipeline.
///
/// Detectors may run on worker threads, so implementations must be
/// `Send + Sync` and should return quickly.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running quality pipeline.
///
/// Clones share one flag, so [`cancel()`](Self::cancel) on any clone is seen
/// by all of them. The pipeline checks the token between stages and the
/// isolation forest checks it between trees; a cancelled run returns
/// [`QualityError::Cancelled`](crate::error::QualityError::Cancelled).
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const WORKING_STAGES: [QualityStage; 5] = [
        QualityStage::Initializing,
        QualityStage::Preprocessing,
        QualityStage::Detection,
        QualityStage::Aggregation,
        QualityStage::Scoring,
    ];

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();
        assert!(!token2.is_cancelled());

        token1.cancel();
        assert!(token2.is_cancelled());

        token2.reset();
        assert!(!token1.is_cancelled());
    }

    #[test]
    fn test_stage_weights_sum_to_one() {
        let total: f32 = WORKING_STAGES.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 0.001, "weights sum to {total}");
    }

    #[test]
    fn test_base_progress_is_cumulative() {
        let mut expected = 0.0;
        for stage in WORKING_STAGES {
            assert!(
                (stage.base_progress() - expected).abs() < 0.001,
                "{stage:?} starts at {} not {expected}",
                stage.base_progress()
            );
            expected += stage.weight();
        }
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            QualityStage::Detection,
            "Detector: duplicates",
            2,
            5,
            "Finished duplicates",
        );
        assert_eq!(update.stage_progress, 0.4);
        assert!((update.progress - (0.25 + 0.65 * 0.4)).abs() < 0.001);
        assert_eq!(update.items_processed, Some(2));
        assert_eq!(update.items_total, Some(5));
    }

    #[test]
    fn test_terminal_updates() {
        let done = ProgressUpdate::complete("Done");
        assert_eq!(done.stage, QualityStage::Complete);
        assert_eq!(done.progress, 1.0);

        let cancelled = ProgressUpdate::cancelled();
        assert_eq!(cancelled.stage, QualityStage::Cancelled);
        assert_eq!(cancelled.progress, 0.0);
    }

    #[test]
    fn test_progress_update_json() {
        let update = ProgressUpdate::new(QualityStage::Preprocessing, 0.5, "Deriving");
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"stage\":\"preprocessing\""));
        assert!(!json.contains("sub_stage"));

        let back: ProgressUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stage, QualityStage::Preprocessing);
    }

    #[test]
    fn test_closure_reporter_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        std::thread::scope(|s| {
            for _ in 0..4 {
                let reporter = reporter.clone();
                s.spawn(move || reporter.report(ProgressUpdate::complete("done")));
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
