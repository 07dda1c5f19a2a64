use std::path::Path;

use crate::errors::PipelineError;
use crate::models::upload::{DocumentFormat, UploadRequest, ValidatedUpload};

pub const NO_FILE_MESSAGE: &str = "No file uploaded";
pub const UNSUPPORTED_TYPE_MESSAGE: &str = "Only PDF and DOCX files are allowed!";
pub const ENGINE_FORMAT_MESSAGE: &str = "Only PDF files are supported by the AI model";

const BYTES_PER_MB: usize = 1024 * 1024;

/// "File is too large. Maximum size is 10MB" for the default limit.
pub fn too_large_message(max_bytes: usize) -> String {
    format!(
        "File is too large. Maximum size is {}MB",
        max_bytes.div_ceil(BYTES_PER_MB)
    )
}

/// "Job description is too long. Maximum size is 1MB" for the default limit.
pub fn job_description_too_long_message(max_bytes: usize) -> String {
    format!(
        "Job description is too long. Maximum size is {}MB",
        max_bytes.div_ceil(BYTES_PER_MB)
    )
}

/// Lower-cased extension of `filename`, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Strips MIME parameters, e.g. "application/pdf; charset=binary" -> "application/pdf".
fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

/// Extension AND declared MIME must both name the same accepted format.
pub fn validate_file_type(
    filename: &str,
    declared_mime_type: &str,
) -> Result<DocumentFormat, PipelineError> {
    let format = file_extension(filename)
        .as_deref()
        .and_then(DocumentFormat::from_extension)
        .ok_or_else(|| PipelineError::validation(UNSUPPORTED_TYPE_MESSAGE))?;

    let mime = normalize_mime_type(declared_mime_type);
    if !format.accepted_mime_types().contains(&mime.as_str()) {
        return Err(PipelineError::validation(UNSUPPORTED_TYPE_MESSAGE));
    }

    Ok(format)
}

pub fn validate_size(size_bytes: usize, max_bytes: usize) -> Result<(), PipelineError> {
    if size_bytes > max_bytes {
        return Err(PipelineError::validation(too_large_message(max_bytes)));
    }
    Ok(())
}

/// Applies the upload rules in order: presence, type, size.
pub fn validate(request: UploadRequest, max_bytes: usize) -> Result<ValidatedUpload, PipelineError> {
    let file = request
        .file
        .ok_or_else(|| PipelineError::validation(NO_FILE_MESSAGE))?;

    let format = validate_file_type(&file.original_filename, &file.declared_mime_type)?;
    validate_size(file.size_bytes(), max_bytes)?;

    Ok(ValidatedUpload {
        file,
        format,
        job_description: request.job_description,
    })
}
