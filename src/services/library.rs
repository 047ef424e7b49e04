use crate::models::{MediaKind, UploadedMedia};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// URL prefix under which stored files are served.
pub const MEDIA_URL_PREFIX: &str = "/videos";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn walk_error(path: &Path) -> impl FnOnce(io::Error) -> LibraryError + '_ {
    move |source| LibraryError::Walk {
        path: path.to_path_buf(),
        source,
    }
}

/// Walks `upload_dir` depth-first in lexical order and returns every stored
/// MP4, JPEG or PNG file. Any I/O error aborts the walk.
pub fn list_media(upload_dir: &Path) -> Result<Vec<UploadedMedia>, LibraryError> {
    let mut media = Vec::new();
    walk(upload_dir, upload_dir, &mut media)?;
    Ok(media)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<UploadedMedia>) -> Result<(), LibraryError> {
    let mut entries = fs::read_dir(dir)
        .map_err(walk_error(dir))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(walk_error(dir))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(walk_error(&path))?;

        if file_type.is_dir() {
            walk(root, &path, out)?;
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(kind) = MediaKind::from_file_name(&name) else {
            continue;
        };

        let metadata = entry.metadata().map_err(walk_error(&path))?;
        let modified = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

        out.push(UploadedMedia {
            href: media_href(root, &path),
            mime: mime_guess::from_path(&path)
                .first_raw()
                .unwrap_or(kind.mime_type())
                .to_string(),
            path: path.to_string_lossy().into_owned(),
            name,
            kind,
            size_bytes: metadata.len(),
            modified,
        });
    }

    Ok(())
}

fn media_href(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}/{}", MEDIA_URL_PREFIX, segments.join("/"))
}
