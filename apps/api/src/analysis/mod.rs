// Analysis pipeline: orchestration, engine-response normalization and the
// HTTP handlers in front of them. All engine calls go through engine_client.

pub mod handlers;
pub mod normalizer;
pub mod pipeline;
