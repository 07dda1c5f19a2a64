use std::fmt;

use bytes::Bytes;

/// Document formats the upload endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
}

impl DocumentFormat {
    /// Parses a lower-cased extension without the leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "pdf" => Some(DocumentFormat::Pdf),
            "doc" => Some(DocumentFormat::Doc),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Docx => "docx",
        }
    }

    /// MIME types a client may legitimately declare for this format.
    pub fn accepted_mime_types(self) -> &'static [&'static str] {
        match self {
            DocumentFormat::Pdf => &["application/pdf"],
            DocumentFormat::Doc => &["application/msword"],
            DocumentFormat::Docx => {
                &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
            }
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The file part of an inbound upload, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Bytes,
    pub original_filename: String,
    pub declared_mime_type: String,
}

impl UploadedFile {
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// One inbound analyze call as read off the wire, before validation.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
    /// Already trimmed; blank input is `None`.
    pub job_description: Option<String>,
}

/// An upload that passed every validator rule.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub file: UploadedFile,
    pub format: DocumentFormat,
    pub job_description: Option<String>,
}
