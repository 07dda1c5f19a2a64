use axum::extract::{multipart::MultipartError, Multipart};
use bytes::BytesMut;
use tracing::debug;

use crate::errors::PipelineError;
use crate::models::upload::{UploadRequest, UploadedFile};
use crate::upload::validation::{
    job_description_too_long_message, validate_file_type, validate_size,
};

/// Multipart field carrying the document.
pub const FILE_FIELD: &str = "resume";
/// Optional multipart text field with the job description.
pub const JOB_DESCRIPTION_FIELD: &str = "jobDescription";

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Per-field byte ceilings applied while the body streams in.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub file_bytes: usize,
    pub job_description_bytes: usize,
}

/// Reads an analyze request off the wire.
///
/// The file type is checked from the part headers before any bytes are read,
/// and both size limits are enforced per chunk, so a disallowed or oversize
/// part is refused while it is still arriving and is never buffered whole.
/// Presence is left to [`crate::upload::validation::validate`].
pub async fn read_upload(
    mut multipart: Multipart,
    limits: UploadLimits,
) -> Result<UploadRequest, PipelineError> {
    let mut request = UploadRequest::default();

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);

        match name.as_deref() {
            Some(FILE_FIELD) => {
                let original_filename = match field.file_name() {
                    Some(filename) if !filename.trim().is_empty() => filename.to_string(),
                    // Browsers send an empty, nameless part when no file was picked.
                    _ => continue,
                };
                if request.file.is_some() {
                    return Err(PipelineError::validation(
                        "Only one resume file may be uploaded",
                    ));
                }
                let declared_mime_type = field
                    .content_type()
                    .unwrap_or(FALLBACK_MIME_TYPE)
                    .to_string();

                validate_file_type(&original_filename, &declared_mime_type)?;

                let mut buffer = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                    validate_size(buffer.len() + chunk.len(), limits.file_bytes)?;
                    buffer.extend_from_slice(&chunk);
                }

                debug!(
                    filename = %original_filename,
                    size_bytes = buffer.len(),
                    "Received upload"
                );

                request.file = Some(UploadedFile {
                    bytes: buffer.freeze(),
                    original_filename,
                    declared_mime_type,
                });
            }
            Some(JOB_DESCRIPTION_FIELD) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                    if buffer.len() + chunk.len() > limits.job_description_bytes {
                        return Err(PipelineError::validation(job_description_too_long_message(
                            limits.job_description_bytes,
                        )));
                    }
                    buffer.extend_from_slice(&chunk);
                }
                let text = String::from_utf8(buffer.to_vec()).map_err(|_| {
                    PipelineError::validation("Malformed upload: job description is not valid UTF-8")
                })?;
                request.job_description = normalize_job_description(&text);
            }
            _ => {}
        }
    }

    Ok(request)
}

/// Trims the job description; blank text counts as absent.
pub fn normalize_job_description(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn malformed(err: MultipartError) -> PipelineError {
    PipelineError::validation(format!("Malformed upload: {}", err.body_text()))
}
