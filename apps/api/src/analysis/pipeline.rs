//! Pipeline Orchestrator.
//!
//! Per request: `Received → Validated → Staged → Dispatched → Normalized → Responded`,
//! with `Failed(kind)` reachable from every stage. Once a file is staged it is
//! released on every exit path, exactly once, before the outcome is returned.
//!
//! The whole run executes on a detached task. If the caller disconnects and
//! the handler future is dropped, the task keeps going until the engine
//! answers or times out, then releases the staged file.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::normalizer::normalize;
use crate::engine_client::AnalysisEngine;
use crate::errors::PipelineError;
use crate::models::report::AnalysisReport;
use crate::models::upload::UploadRequest;
use crate::staging::{StagedFile, StagingStore};
use crate::upload::validation::{validate, ENGINE_FORMAT_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Staged,
    Dispatched,
    Normalized,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Staged => "staged",
            Stage::Dispatched => "dispatched",
            Stage::Normalized => "normalized",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    staging: StagingStore,
    engine: Arc<dyn AnalysisEngine>,
    max_upload_bytes: usize,
}

impl AnalysisPipeline {
    pub fn new(staging: StagingStore, engine: Arc<dyn AnalysisEngine>, max_upload_bytes: usize) -> Self {
        Self {
            staging,
            engine,
            max_upload_bytes,
        }
    }

    /// Runs one request through the pipeline on a detached task.
    pub async fn run(&self, request: UploadRequest) -> Result<AnalysisReport, PipelineError> {
        let request_id = Uuid::new_v4();
        let pipeline = self.clone();

        let task = tokio::spawn(
            async move { pipeline.process(request).await }
                .instrument(info_span!("analyze", %request_id)),
        );

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(PipelineError::InternalFailure(anyhow::anyhow!(
                "Analysis task for request {request_id} did not complete: {e}"
            ))),
        }
    }

    async fn process(self, request: UploadRequest) -> Result<AnalysisReport, PipelineError> {
        enter(Stage::Received);

        let upload =
            validate(request, self.max_upload_bytes).map_err(|e| failed(Stage::Received, e))?;
        enter(Stage::Validated);

        let staged = self
            .staging
            .stage(&upload.file, upload.format)
            .await
            .map_err(|e| failed(Stage::Validated, e))?;
        enter(Stage::Staged);

        // A panic while dispatching must not skip the release below.
        let outcome = AssertUnwindSafe(self.dispatch(&staged, upload.job_description.as_deref()))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(PipelineError::InternalFailure(anyhow::anyhow!(
                    "Analysis dispatch panicked"
                )))
            });

        self.staging.release(staged).await;

        match outcome {
            Ok(report) => {
                enter(Stage::Responded);
                info!(
                    score = report.score,
                    match_percentage = report.match_percentage,
                    "Analysis complete"
                );
                Ok(report)
            }
            Err(e) => Err(failed(Stage::Staged, e)),
        }
    }

    async fn dispatch(
        &self,
        staged: &StagedFile,
        job_description: Option<&str>,
    ) -> Result<AnalysisReport, PipelineError> {
        if !self.engine.supports(staged.format()) {
            return Err(PipelineError::validation(ENGINE_FORMAT_MESSAGE));
        }

        enter(Stage::Dispatched);
        let raw = self.engine.analyze(staged, job_description).await?;

        let report = normalize(&raw)?;
        enter(Stage::Normalized);
        Ok(report)
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "Pipeline transition");
}

fn failed(stage: Stage, err: PipelineError) -> PipelineError {
    match &err {
        PipelineError::ValidationFailed(msg) => {
            info!(%stage, kind = err.kind(), "Upload rejected: {msg}")
        }
        PipelineError::InternalFailure(e) => {
            error!(%stage, kind = err.kind(), "Analysis failed: {e:#}")
        }
        _ => warn!(%stage, kind = err.kind(), "Analysis failed: {err}"),
    }
    err
}
