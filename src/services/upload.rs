//! Upload validation and persistence.
//!
//! A part is read far enough to sniff its leading bytes, checked against the
//! [`UploadPolicy`], and only then given a file in the upload directory. The
//! bytes already read for sniffing are written first, so the stored file is
//! always the complete stream.

use crate::config::format_size;
use crate::models::{MediaKind, StoredMedia};
use crate::services::progress::{log_progress, ProgressWriter};
use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Number of leading bytes inspected to classify an upload.
pub const SNIFF_LEN: usize = 512;

pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 512 * 1024 * 1024;

/// Upper bound on `<stamp>-<n>` retries when a timestamp is already taken.
const MAX_NAME_ATTEMPTS: u32 = 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("The uploaded file is too big: {name}. Please use a file less than {limit} in size")]
    TooLarge { name: String, limit: String },

    #[error("The provided file format is not allowed. Please upload an MP4, JPEG, or PNG file")]
    UnsupportedType { detected: Option<String> },

    #[error("{0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::TooLarge { .. } | UploadError::UnsupportedType { .. } => {
                StatusCode::BAD_REQUEST
            }
            UploadError::Multipart(e) => e.status(),
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            _ if status.is_server_error() => tracing::error!("Upload failed: {:?}", self),
            UploadError::UnsupportedType { detected } => {
                tracing::warn!(detected = ?detected, "Upload rejected: {}", self)
            }
            _ => tracing::warn!("Upload rejected: {}", self),
        }
        (status, self.to_string()).into_response()
    }
}

/// Size and type rules every uploaded part must satisfy.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_size: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_SIZE)
    }
}

impl UploadPolicy {
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn check_size(&self, name: &str, size: u64) -> Result<(), UploadError> {
        if size > self.max_size {
            return Err(UploadError::TooLarge {
                name: name.to_string(),
                limit: format_size(self.max_size),
            });
        }
        Ok(())
    }

    /// Classifies `prefix` by magic bytes. Only the first [`SNIFF_LEN`]
    /// bytes are looked at.
    ///
    /// An ISO media file whose major brand is not MP4 (M4V, QuickTime) still
    /// counts as MP4 when one of its compatible brands starts with `mp4`.
    pub fn sniff(&self, prefix: &[u8]) -> Result<MediaKind, UploadError> {
        let head = &prefix[..prefix.len().min(SNIFF_LEN)];
        let detected = infer::get(head).map(|t| t.mime_type());

        if let Some(kind) = detected.and_then(MediaKind::from_mime) {
            return Ok(kind);
        }
        if has_mp4_brand(head) {
            return Ok(MediaKind::Mp4);
        }
        Err(UploadError::UnsupportedType {
            detected: detected.map(str::to_string),
        })
    }
}

/// Scans the leading `ftyp` box for a major or compatible brand beginning
/// with `mp4`. The box must fit in `head` and have a 4-byte aligned size.
fn has_mp4_brand(head: &[u8]) -> bool {
    if head.len() < 12 || &head[4..8] != b"ftyp" {
        return false;
    }
    let box_size = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;
    if box_size > head.len() || box_size % 4 != 0 {
        return false;
    }

    // Offset 12 holds the minor version, not a brand.
    (8..box_size)
        .step_by(4)
        .filter(|&offset| offset != 12)
        .any(|offset| head[offset..offset + 3] == *b"mp4")
}

/// Source of upload bytes, consumed chunk by chunk.
#[allow(async_fn_in_trait)]
pub trait ChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError>;
}

impl ChunkSource for Field<'_> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        Ok(self.chunk().await?)
    }
}

impl ChunkSource for VecDeque<Bytes> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        Ok(self.pop_front())
    }
}

/// Nanosecond wall clock used to name stored files.
pub trait Clock: Send + Sync {
    fn now_nanos(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    }
}

/// Writes validated uploads into a single directory.
#[derive(Clone)]
pub struct MediaStore {
    upload_dir: PathBuf,
    policy: UploadPolicy,
    clock: Arc<dyn Clock>,
}

impl MediaStore {
    pub fn new(upload_dir: impl Into<PathBuf>, policy: UploadPolicy) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await
    }

    /// Validates and stores one uploaded part.
    ///
    /// Nothing is created on disk unless the sniffed type is accepted. If the
    /// copy fails afterwards the partial file is removed.
    pub async fn persist<S>(
        &self,
        original_name: &str,
        source: &mut S,
    ) -> Result<StoredMedia, UploadError>
    where
        S: ChunkSource,
    {
        let mut head: Vec<Bytes> = Vec::new();
        let mut head_len: u64 = 0;
        while head_len < SNIFF_LEN as u64 {
            match source.next_chunk().await? {
                Some(chunk) => {
                    head_len += chunk.len() as u64;
                    self.policy.check_size(original_name, head_len)?;
                    head.push(chunk);
                }
                None => break,
            }
        }

        let mut prefix = Vec::with_capacity(SNIFF_LEN);
        for chunk in &head {
            let take = (SNIFF_LEN - prefix.len()).min(chunk.len());
            prefix.extend_from_slice(&chunk[..take]);
            if prefix.len() == SNIFF_LEN {
                break;
            }
        }
        let kind = self.policy.sniff(&prefix)?;

        self.ensure_dir().await?;
        let extension = destination_extension(original_name, kind);
        let (name, path, file) = self.allocate(&extension).await?;

        let written = match self.copy(original_name, &name, file, head, source).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("Could not remove partial upload {:?}: {}", path, remove_err);
                }
                return Err(e);
            }
        };

        tracing::info!(
            file = %name,
            original = %original_name,
            kind = kind.mime_type(),
            bytes = written,
            "Stored upload"
        );

        Ok(StoredMedia {
            name,
            original_name: original_name.to_string(),
            path,
            kind,
            size_bytes: written,
        })
    }

    async fn copy<S>(
        &self,
        original_name: &str,
        name: &str,
        file: File,
        head: Vec<Bytes>,
        source: &mut S,
    ) -> Result<u64, UploadError>
    where
        S: ChunkSource,
    {
        let mut writer = ProgressWriter::new(file, log_progress(name.to_string()));

        for chunk in head {
            writer.write_all(&chunk).await?;
        }
        while let Some(chunk) = source.next_chunk().await? {
            self.policy
                .check_size(original_name, writer.bytes_written() + chunk.len() as u64)?;
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;

        Ok(writer.bytes_written())
    }

    /// Creates a fresh file named after the current timestamp. An existing
    /// file is never reused: a taken name gets a `-<n>` suffix instead.
    async fn allocate(&self, extension: &str) -> io::Result<(String, PathBuf, File)> {
        let stamp = self.clock.now_nanos();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.{}", stamp, extension)
            } else {
                format!("{}-{}.{}", stamp, attempt, extension)
            };
            let path = self.upload_dir.join(&name);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((name, path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for timestamp {}", stamp),
        ))
    }
}

/// Extension of the client's file name, or the sniffed kind's own extension
/// when the name has none usable.
pub fn destination_extension(original_name: &str, kind: MediaKind) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_string)
        .unwrap_or_else(|| kind.extension().to_string())
}
