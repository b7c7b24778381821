//! The quality pipeline and its builder.

use crate::config::{ConfigValidationError, QualityConfig};
use crate::detectors::{AnomalyModel, DetectionContext, Detector, IsolationForest};
use crate::error::{QualityError, Result};
use crate::pipeline::executor::DetectorExecutor;
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate, QualityStage,
};
use crate::preprocess::{DerivedAttributes, Preprocessor};
use crate::reporting::QualityReport;
use crate::utils::{column_series, is_numeric_dtype};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs preprocessing, the five detectors, aggregation and scoring over one
/// dataset snapshot.
///
/// # Example
///
/// ```rust,ignore
/// use lex_quality::{QualityConfig, QualityPipeline};
///
/// let report = QualityPipeline::builder()
///     .config(QualityConfig::builder().contamination(0.05).build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(&df)?;
///
/// println!("{}", report.severity_frame()?);
/// ```
pub struct QualityPipeline {
    config: QualityConfig,
    preprocessor: Preprocessor,
    anomaly_model: Option<Arc<dyn AnomalyModel>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(QualityPipeline: Send, Sync);

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct QualityRun {
    pub derived: DerivedAttributes,
    pub report: QualityReport,
}

impl QualityPipeline {
    pub fn builder() -> QualityPipelineBuilder {
        QualityPipelineBuilder::default()
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Evaluate `df` and return the quality report.
    ///
    /// # Errors
    ///
    /// - [`QualityError::InvalidConfig`] if a configured column is missing
    ///   from `df`; no detector runs in that case.
    /// - [`QualityError::DetectorFailed`] if any detector fails.
    /// - [`QualityError::Cancelled`] if the cancellation token fired.
    pub fn run(&self, df: &DataFrame) -> Result<QualityReport> {
        self.run_with_attributes(df).map(|run| run.report)
    }

    /// Like [`run`](Self::run), also returning the derived attributes.
    pub fn run_with_attributes(&self, df: &DataFrame) -> Result<QualityRun> {
        match self.run_internal(df) {
            Ok(run) => {
                self.report_progress(ProgressUpdate::complete("Quality run complete"));
                Ok(run)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Quality run error: {}", e);
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(QualityError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, df: &DataFrame) -> Result<QualityRun> {
        let start_time = Instant::now();
        info!(
            "Starting quality run over {} rows x {} columns",
            df.height(),
            df.width()
        );
        self.report_progress(ProgressUpdate::new(
            QualityStage::Initializing,
            0.0,
            "Validating configuration...",
        ));
        self.config.validate_schema(df)?;
        self.preprocessor.validate_schema(df)?;
        for name in self.config.feature_columns.iter().chain([&self.config.outlier_column]) {
            let dtype = column_series(df, name)?.dtype();
            if !is_numeric_dtype(dtype) {
                warn!(
                    "Column '{}' has type {}; non-numeric values are ignored",
                    name, dtype
                );
            }
        }
        self.check_cancelled()?;

        self.report_progress(ProgressUpdate::new(
            QualityStage::Preprocessing,
            0.0,
            "Deriving record attributes...",
        ));
        let derived = self.preprocessor.process(df)?;
        self.check_cancelled()?;

        self.report_progress(ProgressUpdate::new(
            QualityStage::Detection,
            0.0,
            format!("Running {} detectors...", Detector::ALL.len()),
        ));
        let default_model;
        let model: &dyn AnomalyModel = match &self.anomaly_model {
            Some(model) => model.as_ref(),
            None => {
                default_model =
                    IsolationForest::new(self.config.estimator_count, self.config.max_samples)
                        .with_cancellation(self.cancellation_token.clone());
                &default_model
            }
        };
        let ctx = DetectionContext {
            df,
            derived: &derived,
            config: &self.config,
            model,
        };
        let on_progress = |update: ProgressUpdate| self.report_progress(update);
        let store = DetectorExecutor::new(
            &Detector::ALL,
            self.config.parallel_detectors,
            &self.cancellation_token,
            &on_progress,
        )
        .run(&ctx)?;
        self.check_cancelled()?;

        self.report_progress(ProgressUpdate::new(
            QualityStage::Aggregation,
            0.0,
            "Summarizing detector results...",
        ));
        let report = QualityReport::from_store(store, df.height());

        self.report_progress(ProgressUpdate::new(
            QualityStage::Scoring,
            1.0,
            "Severity scoring complete",
        ));
        info!(
            "Quality run finished in {:?}: score {:.1}",
            start_time.elapsed(),
            report.quality_score()
        );

        Ok(QualityRun { derived, report })
    }
}

/// Builder for [`QualityPipeline`].
#[derive(Default)]
pub struct QualityPipelineBuilder {
    config: Option<QualityConfig>,
    preprocessor: Option<Preprocessor>,
    anomaly_model: Option<Arc<dyn AnomalyModel>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(QualityPipelineBuilder: Send);

impl QualityPipelineBuilder {
    pub fn config(mut self, config: QualityConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the preprocessor (e.g. a different identifier column).
    pub fn preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// Replace the isolation forest with another [`AnomalyModel`].
    pub fn anomaly_model(mut self, model: Arc<dyn AnomalyModel>) -> Self {
        self.anomaly_model = Some(model);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Cancel the run from another thread through a clone of `token`.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<QualityPipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(QualityPipeline {
            config,
            preprocessor: self.preprocessor.unwrap_or_default(),
            anomaly_model: self.anomaly_model,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}
