use std::{fmt, path::PathBuf, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Mood tag for a night out. Older snapshots stored the localized labels,
/// which are still accepted when reading.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Vibe {
    #[default]
    #[serde(alias = "Energético")]
    Energetic,
    #[serde(alias = "Nostálgico")]
    Nostalgic,
    #[serde(alias = "Intimista")]
    Intimate,
    #[serde(alias = "Eufórico")]
    Euphoric,
    #[serde(alias = "Relaxante")]
    Chill,
}

impl Vibe {
    pub const ALL: [Vibe; 5] = [
        Vibe::Energetic,
        Vibe::Nostalgic,
        Vibe::Intimate,
        Vibe::Euphoric,
        Vibe::Chill,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Vibe::Energetic => "Energetic",
            Vibe::Nostalgic => "Nostalgic",
            Vibe::Intimate => "Intimate",
            Vibe::Euphoric => "Euphoric",
            Vibe::Chill => "Chill",
        }
    }

    fn legacy_label(&self) -> &'static str {
        match self {
            Vibe::Energetic => "Energético",
            Vibe::Nostalgic => "Nostálgico",
            Vibe::Intimate => "Intimista",
            Vibe::Euphoric => "Eufórico",
            Vibe::Chill => "Relaxante",
        }
    }
}

impl fmt::Display for Vibe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Vibe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Vibe::ALL
            .into_iter()
            .find(|vibe| {
                vibe.label().to_lowercase() == wanted
                    || vibe.legacy_label().to_lowercase() == wanted
            })
            .ok_or_else(|| {
                let options = Vibe::ALL.map(|v| v.label()).join(", ");
                format!("unknown vibe '{s}' (expected one of: {options})")
            })
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Anything that is not declared as an image is treated as a video.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            MediaKind::Image
        } else {
            MediaKind::Video
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// The local file behind a media item that has not been committed yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    pub content_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Media {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Preview reference before the owning show is saved, data URL after.
    pub url: String,
    #[serde(skip)]
    pub file: Option<PendingFile>,
}

impl Media {
    pub fn is_pending(&self) -> bool {
        self.file.is_some()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Show {
    pub id: String,
    pub artist: String,
    pub date: NaiveDate,
    pub location: String,
    pub vibe: Vibe,
    pub media: Vec<Media>,
}

impl Show {
    pub fn from_new(id: String, new_show: NewShow) -> Self {
        Self {
            id,
            artist: new_show.artist,
            date: new_show.date,
            location: new_show.location,
            vibe: new_show.vibe,
            media: new_show.media,
        }
    }

    /// Long-form date used for display and search, e.g. "May 1, 2023".
    pub fn display_date(&self) -> String {
        self.date.format("%B %-d, %Y").to_string()
    }

    pub fn cover(&self) -> Option<&Media> {
        self.media.first()
    }
}

/// A show as submitted by the form, before the store assigns an id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewShow {
    pub artist: String,
    pub date: NaiveDate,
    pub location: String,
    pub vibe: Vibe,
    pub media: Vec<Media>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CitationSource {
    Web,
    Maps,
}

/// A grounding source attached to an AI answer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Citation {
    pub source: CitationSource,
    pub uri: String,
    pub title: String,
}

/// Text answer plus the sources it was grounded on.
#[derive(Serialize, Clone, Debug, PartialEq, Default)]
pub struct GroundedText {
    pub text: String,
    pub citations: Vec<Citation>,
}

impl GroundedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}
