//! Engine Client — the single point of entry for every call to the analysis engine.
//!
//! No other module talks to the engine over HTTP. Transport failures are
//! classified here (unreachable vs. timeout vs. an error the engine reported)
//! and never leave this module as raw `reqwest` errors without a category.
//! There is no retry: a failed analysis is reported once.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::models::report::SkillCatalog;
use crate::models::upload::DocumentFormat;
use crate::staging::StagedFile;
use crate::upload::multipart::{FILE_FIELD, JOB_DESCRIPTION_FIELD};

const ANALYZE_PATH: &str = "/analyze";
const HEALTH_PATH: &str = "/health";
const SKILLS_PATH: &str = "/skills";
/// Liveness probes are informational and must answer quickly.
const PING_TIMEOUT: Duration = Duration::from_secs(5);
const GENERIC_ENGINE_MESSAGE: &str = "The AI model returned an error without details";

#[derive(Debug, Error)]
pub enum EngineClientError {
    #[error("analysis engine unreachable at {url}: {detail}")]
    Unreachable { url: String, detail: String },

    #[error("analysis engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("analysis engine returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("analysis engine returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a liveness probe. Never an error: an unreachable engine is a
/// degraded status, not a failure of the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineHealth {
    pub reachable: bool,
    /// The engine's own health payload when reachable, else a description.
    pub detail: Value,
}

impl EngineHealth {
    pub fn up(payload: Value) -> Self {
        Self {
            reachable: true,
            detail: payload,
        }
    }

    pub fn down(reason: impl Into<String>) -> Self {
        Self {
            reachable: false,
            detail: Value::String(reason.into()),
        }
    }
}

/// The analysis engine seam. Implement this to swap the transport without
/// touching the pipeline or handlers.
///
/// Carried in `AppState` as `Arc<dyn AnalysisEngine>`.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Whether the engine can read documents of this format.
    fn supports(&self, format: DocumentFormat) -> bool;

    /// Submits a staged document and returns the engine's raw JSON answer.
    async fn analyze(
        &self,
        staged: &StagedFile,
        job_description: Option<&str>,
    ) -> Result<Value, EngineClientError>;

    async fn ping(&self) -> EngineHealth;

    async fn skills(&self) -> Result<SkillCatalog, EngineClientError>;
}

/// HTTP client for the analysis engine.
#[derive(Clone)]
pub struct EngineClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    pdf_only: bool,
}

impl EngineClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, pdf_only: bool) -> anyhow::Result<Self> {
        // No body size cap on the outbound side: uploads are already validated.
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            pdf_only,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sorts a transport failure into unreachable / timeout / other.
    fn classify(&self, err: reqwest::Error) -> EngineClientError {
        if err.is_timeout() {
            EngineClientError::Timeout(self.timeout)
        } else if err.is_connect() {
            EngineClientError::Unreachable {
                url: self.base_url.clone(),
                detail: root_cause(&err),
            }
        } else {
            EngineClientError::Http(err)
        }
    }
}

#[async_trait]
impl AnalysisEngine for EngineClient {
    fn supports(&self, format: DocumentFormat) -> bool {
        !self.pdf_only || format == DocumentFormat::Pdf
    }

    async fn analyze(
        &self,
        staged: &StagedFile,
        job_description: Option<&str>,
    ) -> Result<Value, EngineClientError> {
        let file = tokio::fs::File::open(staged.path()).await?;
        let length = file.metadata().await?.len();

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(staged.unique_name().to_string())
            .mime_str(staged.mime_type())?;

        let mut form = Form::new().part(FILE_FIELD, part);
        if let Some(text) = job_description {
            form = form.text(JOB_DESCRIPTION_FIELD, text.to_string());
        }

        debug!(
            staged = %staged.unique_name(),
            original = %staged.original_filename(),
            size_bytes = length,
            with_job_description = job_description.is_some(),
            "Submitting document to analysis engine"
        );

        let response = self
            .client
            .post(self.url(ANALYZE_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let response = reject_failure(response).await?;
        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        serde_json::from_slice(&bytes).map_err(|e| EngineClientError::InvalidResponse(e.to_string()))
    }

    async fn ping(&self) -> EngineHealth {
        let response = match self
            .client
            .get(self.url(HEALTH_PATH))
            .timeout(PING_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Analysis engine health probe failed: {e}");
                return EngineHealth::down(root_cause(&e));
            }
        };

        if !response.status().is_success() {
            return EngineHealth::down(format!(
                "engine health check returned {}",
                response.status()
            ));
        }

        match response.json::<Value>().await {
            Ok(payload) => EngineHealth::up(payload),
            Err(e) => EngineHealth::down(format!("engine health payload unreadable: {e}")),
        }
    }

    async fn skills(&self) -> Result<SkillCatalog, EngineClientError> {
        let response = self
            .client
            .get(self.url(SKILLS_PATH))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let response = reject_failure(response).await?;
        let raw: RawSkills = response
            .json()
            .await
            .map_err(|e| EngineClientError::InvalidResponse(e.to_string()))?;
        Ok(raw.into())
    }
}

/// Turns a non-2xx engine answer into `Api`, keeping the engine's own message.
async fn reject_failure(response: Response) -> Result<Response, EngineClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| engine_message(&v))
        .unwrap_or_else(|| GENERIC_ENGINE_MESSAGE.to_string());
    warn!("Analysis engine returned {}: {}", status, message);
    Err(EngineClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// The engine lists skills in snake_case; the API serves camelCase.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSkills {
    technical_skills: Vec<String>,
    soft_skills: Vec<String>,
}

impl From<RawSkills> for SkillCatalog {
    fn from(raw: RawSkills) -> Self {
        let total = raw.technical_skills.len() + raw.soft_skills.len();
        SkillCatalog {
            technical_skills: raw.technical_skills,
            soft_skills: raw.soft_skills,
            total,
        }
    }
}

/// Extracts the human-readable message from an engine error payload:
/// `message` wins over `error`.
pub fn engine_message(payload: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| payload.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

/// Innermost cause, e.g. "Connection refused (os error 111)".
fn root_cause(err: &reqwest::Error) -> String {
    use std::error::Error;

    let mut cause: &dyn Error = err;
    while let Some(next) = cause.source() {
        cause = next;
    }
    cause.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::upload::UploadedFile;
    use crate::staging::StagingStore;
    use bytes::Bytes;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn staged_pdf(dir: &tempfile::TempDir) -> StagedFile {
        let store = StagingStore::new(dir.path(), Duration::from_secs(5));
        store
            .stage(
                &UploadedFile {
                    bytes: Bytes::from_static(b"%PDF-1.4 resume body"),
                    original_filename: "cv.pdf".to_string(),
                    declared_mime_type: "application/pdf".to_string(),
                },
                DocumentFormat::Pdf,
            )
            .await
            .unwrap()
    }

    fn client(url: &str) -> EngineClient {
        EngineClient::new(url, Duration::from_secs(5), true).unwrap()
    }

    /// A local address nothing listens on.
    fn refused_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    #[test]
    fn test_engine_message_prefers_message() {
        let payload = json!({ "error": "Error analyzing resume", "message": "bad xref table" });
        assert_eq!(engine_message(&payload).as_deref(), Some("bad xref table"));
    }

    #[test]
    fn test_engine_message_falls_back_to_error() {
        let payload = json!({ "error": "Only PDF files are supported" });
        assert_eq!(
            engine_message(&payload).as_deref(),
            Some("Only PDF files are supported")
        );
        assert_eq!(engine_message(&json!({ "message": "  " })), None);
        assert_eq!(engine_message(&json!([1, 2])), None);
    }

    #[test]
    fn test_supports_respects_pdf_only() {
        let strict = EngineClient::new("http://engine", Duration::from_secs(1), true).unwrap();
        assert!(strict.supports(DocumentFormat::Pdf));
        assert!(!strict.supports(DocumentFormat::Docx));

        let lenient = EngineClient::new("http://engine/", Duration::from_secs(1), false).unwrap();
        assert!(lenient.supports(DocumentFormat::Doc));
        assert_eq!(lenient.base_url(), "http://engine");
    }

    #[tokio::test]
    async fn test_analyze_sends_file_and_job_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_string_contains("name=\"resume\""))
            .and(body_string_contains("%PDF-1.4 resume body"))
            .and(body_string_contains("name=\"jobDescription\""))
            .and(body_string_contains("Rust backend engineer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "score": 81 })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let staged = staged_pdf(&dir).await;
        let raw = client(&server.uri())
            .analyze(&staged, Some("Rust backend engineer"))
            .await
            .unwrap();
        assert_eq!(raw["score"], 81);
    }

    #[tokio::test]
    async fn test_analyze_uses_staged_name_as_filename() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_pdf(&dir).await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_string_contains(format!(
                "filename=\"{}\"",
                staged.unique_name()
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri()).analyze(&staged, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_analyze_surfaces_engine_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "Error analyzing resume",
                "message": "PDF is encrypted"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let staged = staged_pdf(&dir).await;
        let err = client(&server.uri()).analyze(&staged, None).await.unwrap_err();
        match err {
            EngineClientError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "PDF is encrypted");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_analyze_non_json_error_uses_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let staged = staged_pdf(&dir).await;
        let err = client(&server.uri()).analyze(&staged, None).await.unwrap_err();
        assert!(
            matches!(err, EngineClientError::Api { status: 502, ref message } if message == GENERIC_ENGINE_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_analyze_non_json_success_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let staged = staged_pdf(&dir).await;
        let err = client(&server.uri()).analyze(&staged, None).await.unwrap_err();
        assert!(matches!(err, EngineClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_analyze_connection_refused_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_pdf(&dir).await;
        let url = refused_url();

        let err = client(&url).analyze(&staged, None).await.unwrap_err();
        match err {
            EngineClientError::Unreachable { url: reported, .. } => assert_eq!(reported, url),
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_analyze_slow_engine_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "score": 1 }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let staged = staged_pdf(&dir).await;
        let client = EngineClient::new(server.uri(), Duration::from_millis(200), true).unwrap();
        let err = client.analyze(&staged, None).await.unwrap_err();
        assert!(matches!(err, EngineClientError::Timeout(d) if d == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_ping_reports_engine_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "healthy", "model_loaded": true })),
            )
            .mount(&server)
            .await;

        let health = client(&server.uri()).ping().await;
        assert!(health.reachable);
        assert_eq!(health.detail["model_loaded"], true);
    }

    #[tokio::test]
    async fn test_ping_never_fails_when_engine_is_down() {
        let health = client(&refused_url()).ping().await;
        assert!(!health.reachable);
        assert!(health.detail.is_string());
    }

    #[tokio::test]
    async fn test_ping_non_success_is_degraded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(!client(&server.uri()).ping().await.reachable);
    }

    #[tokio::test]
    async fn test_skills_are_converted_to_camel_case_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/skills"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "technical_skills": ["python", "docker"],
                "soft_skills": ["leadership"],
                "total": 3
            })))
            .mount(&server)
            .await;

        let catalog = client(&server.uri()).skills().await.unwrap();
        assert_eq!(catalog.technical_skills, vec!["python", "docker"]);
        assert_eq!(catalog.soft_skills, vec!["leadership"]);
        assert_eq!(catalog.total, 3);
    }
}
