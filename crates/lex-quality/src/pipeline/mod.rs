//! Pipeline module.
//!
//! Orchestrates one quality run: validation, preprocessing, the detector
//! set, then aggregation and scoring.

mod builder;
mod executor;
pub mod progress;

pub use builder::{QualityPipeline, QualityPipelineBuilder, QualityRun};
pub use executor::DetectorExecutor;
pub use progress::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate, QualityStage,
};
