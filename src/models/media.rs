use serde::Serialize;
use std::path::PathBuf;

/// The media formats the server accepts and lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Mp4,
    Jpeg,
    Png,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Mp4, MediaKind::Jpeg, MediaKind::Png];

    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::Mp4 => "video/mp4",
            MediaKind::Jpeg => "image/jpeg",
            MediaKind::Png => "image/png",
        }
    }

    /// Extension used when the uploaded filename carries none.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Mp4 => "mp4",
            MediaKind::Jpeg => "jpg",
            MediaKind::Png => "png",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.mime_type() == mime)
    }

    /// Classifies a stored file by name. Only the three listed suffixes
    /// count, matched case-sensitively.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| name.ends_with(&format!(".{}", k.extension())))
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Mp4)
    }
}

/// One stored file as discovered on disk by the library walk.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedMedia {
    pub name: String,
    pub path: String,
    pub href: String,
    pub kind: MediaKind,
    pub mime: String,
    pub size_bytes: u64,
    pub modified: Option<String>,
}

impl UploadedMedia {
    pub fn is_video(&self) -> bool {
        self.kind.is_video()
    }
}

/// The outcome of persisting one uploaded part.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMedia {
    /// File name allocated in the upload directory.
    pub name: String,
    /// File name the client sent.
    pub original_name: String,
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size_bytes: u64,
}
