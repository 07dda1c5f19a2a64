use std::sync::Arc;

use crate::analysis::pipeline::AnalysisPipeline;
use crate::config::Config;
use crate::engine_client::AnalysisEngine;
use crate::staging::StagingStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable engine transport. Default: the HTTP `EngineClient`.
    pub engine: Arc<dyn AnalysisEngine>,
    pub pipeline: AnalysisPipeline,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<dyn AnalysisEngine>) -> Self {
        let staging = StagingStore::new(config.upload_dir.clone(), config.staging_timeout);
        let pipeline = AnalysisPipeline::new(staging, engine.clone(), config.max_upload_bytes);

        Self {
            config,
            engine,
            pipeline,
        }
    }
}
