use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Upload ceiling applied when `MAX_UPLOAD_BYTES` is not set (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Ceiling for the `jobDescription` text field (1 MiB).
pub const DEFAULT_MAX_JOB_DESCRIPTION_BYTES: usize = 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Every value has a default; malformed values abort startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Directory that holds staged uploads for the lifetime of one request.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub max_job_description_bytes: usize,
    /// Base URL of the analysis engine, without a trailing slash.
    pub engine_url: String,
    pub engine_timeout: Duration,
    /// The engine only reads PDFs; doc/docx uploads are refused at dispatch.
    pub engine_pdf_only: bool,
    pub staging_timeout: Duration,
    /// Single allowed CORS origin. `None` means permissive CORS.
    pub cors_allow_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 5000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            max_job_description_bytes: parse_env(
                "MAX_JOB_DESCRIPTION_BYTES",
                DEFAULT_MAX_JOB_DESCRIPTION_BYTES,
            )?,
            engine_url: env_or("ENGINE_URL", "http://localhost:5001")
                .trim_end_matches('/')
                .to_string(),
            engine_timeout: Duration::from_secs(parse_env("ENGINE_TIMEOUT_SECS", 30)?),
            engine_pdf_only: parse_env("ENGINE_PDF_ONLY", true)?,
            staging_timeout: Duration::from_secs(parse_env("STAGING_TIMEOUT_SECS", 10)?),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN")
                .ok()
                .filter(|origin| !origin.trim().is_empty()),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Defaults for tests: staging into `upload_dir`, engine at `engine_url`.
    pub fn for_tests(upload_dir: PathBuf, engine_url: &str) -> Self {
        Config {
            port: 0,
            rust_log: "debug".to_string(),
            upload_dir,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_job_description_bytes: DEFAULT_MAX_JOB_DESCRIPTION_BYTES,
            engine_url: engine_url.trim_end_matches('/').to_string(),
            engine_timeout: Duration::from_secs(30),
            engine_pdf_only: true,
            staging_timeout: Duration::from_secs(10),
            cors_allow_origin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u64 = parse_env("RESUME_API_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("RESUME_API_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16> = parse_env("RESUME_API_TEST_BAD_PORT", 5000);
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("RESUME_API_TEST_BAD_PORT"));
    }

    #[test]
    fn test_parse_env_reads_bool() {
        std::env::set_var("RESUME_API_TEST_PDF_ONLY", "false");
        let value: bool = parse_env("RESUME_API_TEST_PDF_ONLY", true).unwrap();
        assert!(!value);
    }
}
