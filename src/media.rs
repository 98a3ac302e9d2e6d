//! Media intake and encoding.
//!
//! Selected files start out as pending media: a `file://` preview reference
//! plus the path to the bytes. When the owning show is committed the bytes
//! are embedded as a `data:` URL so the snapshot is self-contained.

use std::{
    fs,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Media, MediaKind, PendingFile};

static DATA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(?P<mime>[\w.+-]+/[\w.+-]+);base64,(?P<data>[A-Za-z0-9+/=\s]*)$")
        .expect("valid data url regex")
});

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unable to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("not a base64 data url")]
    MalformedDataUrl,
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Binary content ready to travel inside a request or a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedMedia {
    pub content_type: String,
    /// Standard base64, no `data:` prefix.
    pub data: String,
}

impl EncodedMedia {
    pub fn from_bytes(content_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            content_type: content_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn from_file(file: &PendingFile) -> Result<Self, MediaError> {
        let bytes = fs::read(&file.path).map_err(|source| MediaError::Io {
            path: file.path.clone(),
            source,
        })?;
        Ok(Self::from_bytes(file.content_type.clone(), &bytes))
    }

    pub fn from_path(path: &Path) -> Result<Self, MediaError> {
        Self::from_file(&PendingFile {
            path: path.to_path_buf(),
            content_type: content_type_for(path).to_string(),
        })
    }

    pub fn parse_data_url(url: &str) -> Result<Self, MediaError> {
        let caps = DATA_URL_RE
            .captures(url.trim())
            .ok_or(MediaError::MalformedDataUrl)?;
        let data: String = caps["data"].split_whitespace().collect();
        if data.is_empty() {
            return Err(MediaError::MalformedDataUrl);
        }
        Ok(Self {
            content_type: caps["mime"].to_string(),
            data,
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>, MediaError> {
        Ok(STANDARD.decode(self.data.as_bytes())?)
    }
}

/// Reads the file and returns its self-describing `data:` URL.
pub fn to_durable_form(file: &PendingFile) -> Result<String, MediaError> {
    EncodedMedia::from_file(file).map(|encoded| encoded.to_data_url())
}

/// Builds a pending media item for a user-selected file.
pub fn pending_media(path: &Path) -> Result<Media, MediaError> {
    let absolute = fs::canonicalize(path).map_err(|source| MediaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let content_type = content_type_for(&absolute).to_string();
    let url = Url::from_file_path(&absolute)
        .map(String::from)
        .unwrap_or_else(|_| absolute.display().to_string());

    Ok(Media {
        id: Uuid::new_v4().to_string(),
        kind: MediaKind::from_content_type(&content_type),
        url,
        file: Some(PendingFile {
            path: absolute,
            content_type,
        }),
    })
}

/// Embeds a pending item's bytes. On read failure the item keeps its preview
/// reference so it stays visible instead of being lost.
pub fn promote(media: Media) -> Media {
    let Some(file) = media.file.as_ref() else {
        return media;
    };
    match to_durable_form(file) {
        Ok(url) => Media {
            id: media.id,
            kind: media.kind,
            url,
            file: None,
        },
        Err(err) => {
            tracing::error!("error converting {} to base64: {err}", media.id);
            media
        }
    }
}

/// Writes a base64 data URL (e.g. a generated poster) to disk.
pub fn write_data_url(data_url: &str, path: &Path) -> Result<(), MediaError> {
    let bytes = EncodedMedia::parse_data_url(data_url)?.decode()?;
    crate::utils::ensure_parent(path);
    fs::write(path, bytes).map_err(|source| MediaError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
