//! Staging Store — transient on-disk copies of uploads, one per request.
//!
//! Names combine a millisecond timestamp with a random UUID and files are
//! opened create-new, so concurrent requests never collide or overwrite each
//! other without any locking. A [`StagedFile`] is consumed by
//! [`StagingStore::release`], which makes a double release unrepresentable.
//! Files orphaned by a crash are swept on the next startup.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::upload::{DocumentFormat, UploadedFile};

const NAME_PREFIX: &str = "resume";

/// Handle to one staged upload. Not `Clone`: exactly one owner per request.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    unique_name: String,
    format: DocumentFormat,
    original_filename: String,
    mime_type: String,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

#[derive(Debug, Clone)]
pub struct StagingStore {
    dir: PathBuf,
    io_timeout: Duration,
}

impl StagingStore {
    pub fn new(dir: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            io_timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the staging directory if it does not exist yet and removes
    /// uploads a previous process left behind. Call before serving.
    pub async fn ensure_dir(&self) -> anyhow::Result<usize> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create staging directory {}", self.dir.display()))?;
        self.sweep_orphans().await
    }

    async fn sweep_orphans(&self) -> anyhow::Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list staging directory {}", self.dir.display()))?;

        let mut swept = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let is_staged = name
                .to_str()
                .is_some_and(|n| n.starts_with(&format!("{NAME_PREFIX}-")));
            if !is_staged || !entry.file_type().await?.is_file() {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => swept += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove orphaned upload {}: {e}", entry.path().display()),
            }
        }

        if swept > 0 {
            info!(swept, "Removed orphaned staged uploads");
        }
        Ok(swept)
    }

    /// Writes the upload under a fresh collision-free name.
    pub async fn stage(
        &self,
        file: &UploadedFile,
        format: DocumentFormat,
    ) -> Result<StagedFile, PipelineError> {
        let unique_name = unique_name(format);
        let path = self.dir.join(&unique_name);

        let target = path.clone();
        let bytes = file.bytes.clone();
        let mut write = tokio::task::spawn_blocking(move || write_new(&target, &bytes));

        let outcome = tokio::time::timeout(self.io_timeout, &mut write).await;
        let written = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(io::Error::new(io::ErrorKind::Other, join.to_string())),
            Err(_) => {
                // A blocking write cannot be cancelled; remove its file once it settles.
                let late = path.clone();
                tokio::spawn(async move {
                    let settled = write.await;
                    if !matches!(settled, Ok(Err(ref e)) if e.kind() == io::ErrorKind::AlreadyExists) {
                        discard(&late).await;
                    }
                });
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("staging write exceeded {:?}", self.io_timeout),
                ))
            }
        };

        if let Err(e) = written {
            // AlreadyExists means the path belongs to somebody else.
            if e.kind() != io::ErrorKind::AlreadyExists {
                discard(&path).await;
            }
            return Err(PipelineError::InternalFailure(
                anyhow::Error::new(e).context(format!("Failed to stage upload as {unique_name}")),
            ));
        }

        info!(
            staged = %unique_name,
            original = %file.original_filename,
            %format,
            size_bytes = file.size_bytes(),
            "Staged upload"
        );

        Ok(StagedFile {
            path,
            unique_name,
            format,
            original_filename: file.original_filename.clone(),
            mime_type: file.declared_mime_type.clone(),
        })
    }

    /// Deletes a staged upload. Best effort: an already missing file is fine,
    /// any other failure is logged and swallowed.
    pub async fn release(&self, staged: StagedFile) {
        match tokio::time::timeout(self.io_timeout, tokio::fs::remove_file(&staged.path)).await {
            Ok(Ok(())) => debug!(staged = %staged.unique_name, "Released staged upload"),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!(staged = %staged.unique_name, "Staged upload already gone")
            }
            Ok(Err(e)) => error!(
                staged = %staged.unique_name,
                "Failed to release staged upload: {e}"
            ),
            Err(_) => error!(
                staged = %staged.unique_name,
                "Timed out releasing staged upload after {:?}", self.io_timeout
            ),
        }
    }
}

/// `resume-<unix millis>-<uuid>.<ext>`
pub fn unique_name(format: DocumentFormat) -> String {
    format!(
        "{NAME_PREFIX}-{}-{}.{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        format.extension()
    )
}

fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.flush()
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            error!("Failed to remove partial staged file {}: {e}", path.display());
        }
    }
}
