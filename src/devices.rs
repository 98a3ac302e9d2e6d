//! Device capabilities requested on demand: location and microphone.
//!
//! Denial or absence is an ordinary value the views turn into text.

use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::media::{self, EncodedMedia};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Could not get your location. Please enable location permissions.")]
    LocationDenied,
    #[error("Geolocation is not supported on this device.")]
    LocationUnsupported,
    #[error("Could not access the microphone. Check your permissions.")]
    MicrophoneDenied,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

pub trait Geolocator: Send + Sync {
    fn current_position(&self) -> Result<Coordinates, PermissionError>;
}

/// Position supplied up front (e.g. from flags). No position means the
/// device has no geolocation at all.
pub struct FixedLocation {
    position: Option<(f64, f64)>,
}

impl FixedLocation {
    pub fn new(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            position: latitude.zip(longitude),
        }
    }
}

impl Geolocator for FixedLocation {
    fn current_position(&self) -> Result<Coordinates, PermissionError> {
        let (latitude, longitude) = self.position.ok_or(PermissionError::LocationUnsupported)?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(PermissionError::LocationDenied);
        }
        Ok(Coordinates {
            latitude,
            longitude,
        })
    }
}

/// A live capture track. `stop` releases the device.
pub trait AudioTrack: Send {
    fn next_chunk(&mut self) -> Option<Vec<u8>>;
    fn content_type(&self) -> String;
    fn stop(&mut self);
}

pub trait Microphone: Send {
    fn open(&mut self) -> Result<Box<dyn AudioTrack>, PermissionError>;
}

/// Recording scoped to one session. The track is released on `stop` and,
/// if the session is dismissed instead, on drop.
pub struct RecordingSession {
    track: Option<Box<dyn AudioTrack>>,
    chunks: Vec<Vec<u8>>,
}

impl RecordingSession {
    pub fn start(microphone: &mut dyn Microphone) -> Result<Self, PermissionError> {
        let track = microphone.open().map_err(|err| {
            tracing::error!("error accessing microphone: {err}");
            err
        })?;
        Ok(Self {
            track: Some(track),
            chunks: Vec::new(),
        })
    }

    pub fn is_recording(&self) -> bool {
        self.track.is_some()
    }

    /// Pulls whatever the track has buffered so far.
    pub fn capture(&mut self) {
        if let Some(track) = self.track.as_mut() {
            while let Some(chunk) = track.next_chunk() {
                self.chunks.push(chunk);
            }
        }
    }

    /// Ends the recording and returns the clip.
    pub fn stop(mut self) -> EncodedMedia {
        self.capture();
        let content_type = self
            .track
            .as_ref()
            .map(|track| track.content_type())
            .unwrap_or_else(|| "audio/webm".to_string());
        self.release();
        let bytes = std::mem::take(&mut self.chunks).concat();
        EncodedMedia::from_bytes(content_type, &bytes)
    }

    fn release(&mut self) {
        if let Some(mut track) = self.track.take() {
            track.stop();
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Plays back a pre-recorded file as if it were captured live.
pub struct FileMicrophone {
    path: PathBuf,
}

impl FileMicrophone {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Microphone for FileMicrophone {
    fn open(&mut self) -> Result<Box<dyn AudioTrack>, PermissionError> {
        let bytes = fs::read(&self.path).map_err(|err| {
            tracing::warn!("cannot open {}: {err}", self.path.display());
            PermissionError::MicrophoneDenied
        })?;
        Ok(Box::new(FileTrack {
            content_type: media::content_type_for(&self.path).to_string(),
            bytes,
            offset: 0,
        }))
    }
}

struct FileTrack {
    content_type: String,
    bytes: Vec<u8>,
    offset: usize,
}

impl AudioTrack for FileTrack {
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        let end = (self.offset + CHUNK_SIZE).min(self.bytes.len());
        let chunk = self.bytes[self.offset..end].to_vec();
        self.offset = end;
        Some(chunk)
    }

    fn content_type(&self) -> String {
        self.content_type.clone()
    }

    fn stop(&mut self) {
        self.offset = self.bytes.len();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeMicrophone;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fixed_location_reports_absence_and_bad_coordinates() {
        assert_eq!(
            FixedLocation::new(None, Some(1.0)).current_position(),
            Err(PermissionError::LocationUnsupported)
        );
        assert_eq!(
            FixedLocation::new(Some(120.0), Some(1.0)).current_position(),
            Err(PermissionError::LocationDenied)
        );
        let here = FixedLocation::new(Some(51.5), Some(-0.17))
            .current_position()
            .unwrap();
        assert_eq!(here.latitude, 51.5);
    }

    #[test]
    fn stop_returns_clip_and_releases_track() {
        let mut mic = FakeMicrophone {
            chunks: vec![b"ab".to_vec(), b"cd".to_vec()],
            ..Default::default()
        };
        let session = RecordingSession::start(&mut mic).unwrap();
        assert!(session.is_recording());

        let clip = session.stop();
        assert_eq!(clip.decode().unwrap(), b"abcd");
        assert_eq!(clip.content_type, "audio/webm");
        assert_eq!(mic.released(), 1);
    }

    #[test]
    fn dismissing_a_session_still_releases_the_device() {
        let mut mic = FakeMicrophone::default();
        let session = RecordingSession::start(&mut mic).unwrap();
        drop(session);
        assert_eq!(mic.released(), 1);
    }

    #[test]
    fn denied_microphone_is_a_permission_error() {
        let mut mic = FakeMicrophone {
            denied: true,
            ..Default::default()
        };
        assert_eq!(
            RecordingSession::start(&mut mic).err(),
            Some(PermissionError::MicrophoneDenied)
        );
    }

    #[test]
    fn file_microphone_streams_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memo.ogg");
        fs::write(&path, vec![7u8; CHUNK_SIZE + 10]).unwrap();

        let mut mic = FileMicrophone::new(&path);
        let clip = RecordingSession::start(&mut mic).unwrap().stop();
        assert_eq!(clip.content_type, "audio/ogg");
        assert_eq!(clip.decode().unwrap().len(), CHUNK_SIZE + 10);

        let mut missing = FileMicrophone::new(&dir.path().join("nope.ogg"));
        assert!(RecordingSession::start(&mut missing).is_err());
    }
}
