use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    devices::Geolocator,
    gateway::{self, AiGateway},
    media::{self, EncodedMedia, MediaError},
    models::{GroundedText, Media, MediaKind, NewShow, Vibe},
    store::{Persisted, ShowStore},
    utils::clean_text,
};

pub const ANALYZING_MEDIA: &str = "Analyzing media...";
pub const ARTIST_NOT_DETECTED: &str = "Could not detect the artist in the image.";
pub const ANALYSIS_ERROR: &str = "Error analyzing the image.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error(
        "Please fill in all fields and upload at least one file (missing: {}).",
        .missing.join(", ")
    )]
    Incomplete { missing: Vec<&'static str> },
}

/// Files picked in one go.
#[derive(Debug, Default)]
pub struct Intake {
    pub attached: Vec<String>,
    pub failed: Vec<(PathBuf, MediaError)>,
}

/// The add-show flow. Nothing reaches the store until every required field
/// and at least one media item are present.
#[derive(Debug, Default)]
pub struct ShowForm {
    pub artist: String,
    pub date: Option<NaiveDate>,
    pub location: String,
    pub vibe: Vibe,
    media: Vec<Media>,
    ai_status: Option<String>,
    venues: Option<GroundedText>,
    playlist: Option<GroundedText>,
}

impl ShowForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn media(&self) -> &[Media] {
        &self.media
    }

    pub fn ai_status(&self) -> Option<&str> {
        self.ai_status.as_deref()
    }

    pub fn venues(&self) -> Option<&GroundedText> {
        self.venues.as_ref()
    }

    pub fn playlist(&self) -> Option<&GroundedText> {
        self.playlist.as_ref()
    }

    pub fn attach_files(&mut self, paths: &[PathBuf]) -> Intake {
        let mut intake = Intake::default();
        for path in paths {
            match media::pending_media(path) {
                Ok(item) => {
                    intake.attached.push(item.id.clone());
                    self.media.push(item);
                }
                Err(err) => {
                    tracing::warn!("skipping {}: {err}", path.display());
                    intake.failed.push((path.clone(), err));
                }
            }
        }
        intake
    }

    pub fn remove_media(&mut self, id: &str) -> bool {
        let before = self.media.len();
        self.media.retain(|item| item.id != id);
        self.media.len() != before
    }

    pub fn preview(&self, id: &str) -> Option<&Media> {
        self.media.iter().find(|item| item.id == id)
    }

    /// Runs artist recognition on the first image of an intake and fills in
    /// the artist when the answer looks like a name.
    pub async fn identify_artist(&mut self, gateway: &AiGateway, intake: &Intake) {
        let Some(file) = intake
            .attached
            .iter()
            .filter_map(|id| self.preview(id))
            .find(|item| item.kind == MediaKind::Image)
            .and_then(|item| item.file.clone())
        else {
            self.ai_status = None;
            return;
        };

        self.ai_status = Some(ANALYZING_MEDIA.to_string());
        let image = match EncodedMedia::from_file(&file) {
            Ok(image) => image,
            Err(err) => {
                tracing::error!("cannot read {}: {err}", file.path.display());
                self.ai_status = Some(ANALYSIS_ERROR.to_string());
                return;
            }
        };

        let detected = gateway.identify_artist(&image).await;
        if gateway::is_unidentified(&detected) {
            self.ai_status = Some(ARTIST_NOT_DETECTED.to_string());
        } else {
            self.ai_status = Some(format!("Detected artist: {detected}"));
            self.artist = detected;
        }
    }

    pub async fn lookup_venues(
        &mut self,
        geolocator: &dyn Geolocator,
        gateway: &AiGateway,
    ) -> &GroundedText {
        let found = match geolocator.current_position() {
            Ok(here) => {
                gateway
                    .find_nearby_venues(here.latitude, here.longitude)
                    .await
            }
            Err(err) => {
                tracing::error!("geolocation error: {err}");
                GroundedText::plain(err.to_string())
            }
        };
        self.venues.insert(found)
    }

    /// No-op until an artist is filled in.
    pub async fn suggest_playlist(&mut self, gateway: &AiGateway) -> Option<&GroundedText> {
        if self.artist.trim().is_empty() {
            return None;
        }
        let suggestion = gateway.suggest_playlist(&self.artist).await;
        Some(self.playlist.insert(suggestion))
    }

    pub fn validate(&self) -> Result<NewShow, FormError> {
        let artist = clean_text(&self.artist);
        let location = clean_text(&self.location);

        let mut missing = Vec::new();
        if artist.is_empty() {
            missing.push("artist");
        }
        if self.date.is_none() {
            missing.push("date");
        }
        if location.is_empty() {
            missing.push("location");
        }
        if self.media.is_empty() {
            missing.push("media");
        }
        let Some(date) = self.date.filter(|_| missing.is_empty()) else {
            return Err(FormError::Incomplete { missing });
        };

        Ok(NewShow {
            artist,
            date,
            location,
            vibe: self.vibe,
            media: self.media.clone(),
        })
    }

    /// Commits the show and clears the form. On a validation error nothing
    /// changes, neither the form nor the store.
    pub fn submit(&mut self, store: &mut ShowStore) -> Result<(String, Persisted), FormError> {
        let new_show = self.validate()?;
        let committed = store.commit(new_show);
        *self = Self::default();
        Ok(committed)
    }
}

/// Convenience for callers holding plain paths.
pub fn attach_one(form: &mut ShowForm, path: &Path) -> Result<String, MediaError> {
    let mut intake = form.attach_files(&[path.to_path_buf()]);
    match intake.failed.pop() {
        Some((_, err)) => Err(err),
        None => Ok(intake.attached.remove(0)),
    }
}
