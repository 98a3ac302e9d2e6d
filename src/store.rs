//! The show collection and its persisted mirror.
//!
//! Memory is authoritative. Every append rewrites the whole snapshot; a
//! failed write is reported back to the caller but the show stays appended.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    media,
    models::{NewShow, Show},
    utils,
};

pub const SNAPSHOT_SLOT: &str = "showVaultShows";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("snapshot is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("existing snapshot could not be read or set aside; refusing to overwrite it")]
    Protected,
    #[error("storage slot rejected the write: {0}")]
    Rejected(String),
}

/// One named slot of durable client storage holding the whole snapshot.
pub trait SnapshotSlot: Send {
    /// Raw snapshot bytes, `None` when nothing was ever written.
    fn read(&self) -> Result<Option<Vec<u8>>, StoreError>;
    fn write(&mut self, contents: &str) -> Result<(), StoreError>;
    /// Sets an unreadable snapshot aside before it can be overwritten.
    fn quarantine(&mut self, contents: &[u8]) -> Result<(), StoreError>;
}

pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(root: &Path, slot: &str) -> Self {
        Self {
            path: utils::slot_path(root, slot),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSlot for FileSlot {
    fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, contents: &str) -> Result<(), StoreError> {
        utils::ensure_parent(&self.path);
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn quarantine(&mut self, contents: &[u8]) -> Result<(), StoreError> {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(SNAPSHOT_SLOT);
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        let aside = self.path.with_file_name(format!("{stem}.corrupt-{stamp}.json"));
        fs::write(&aside, contents)?;
        tracing::warn!("unreadable snapshot copied to {}", aside.display());
        Ok(())
    }
}

#[derive(Default)]
struct MemorySlotState {
    contents: Option<Vec<u8>>,
    quarantined: Vec<Vec<u8>>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

/// In-process slot. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemorySlot {
    state: Arc<Mutex<MemorySlotState>>,
}

impl MemorySlot {
    pub fn with_contents(contents: impl Into<Vec<u8>>) -> Self {
        let slot = Self::default();
        slot.lock().contents = Some(contents.into());
        slot
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.lock().contents.clone()
    }

    pub fn quarantined(&self) -> Vec<Vec<u8>> {
        self.lock().quarantined.clone()
    }

    /// Simulates storage that exists but cannot be read.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Simulates a full storage quota.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySlotState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotSlot for MemorySlot {
    fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self.lock();
        if state.fail_reads {
            return Err(StoreError::Rejected("read denied".to_string()));
        }
        Ok(state.contents.clone())
    }

    fn write(&mut self, contents: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StoreError::Rejected("quota exceeded".to_string()));
        }
        state.contents = Some(contents.as_bytes().to_vec());
        state.writes += 1;
        Ok(())
    }

    fn quarantine(&mut self, contents: &[u8]) -> Result<(), StoreError> {
        self.lock().quarantined.push(contents.to_vec());
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    shows: &'a [Show],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotIn {
    Versioned { version: u32, shows: Vec<Show> },
    Legacy(Vec<Show>),
}

pub fn encode_snapshot(shows: &[Show]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&SnapshotOut {
        version: SNAPSHOT_VERSION,
        shows,
    })?)
}

pub fn decode_snapshot(contents: &[u8]) -> Result<Vec<Show>, StoreError> {
    let text = std::str::from_utf8(contents)?;
    match serde_json::from_str::<SnapshotIn>(text)? {
        SnapshotIn::Versioned { version, shows } if version <= SNAPSHOT_VERSION => Ok(shows),
        SnapshotIn::Versioned { version, .. } => Err(StoreError::UnsupportedVersion(version)),
        SnapshotIn::Legacy(shows) => Ok(shows),
    }
}

/// Result of mirroring the collection to storage after a mutation.
#[must_use]
#[derive(Debug)]
pub enum Persisted {
    Saved,
    Failed(StoreError),
}

impl Persisted {
    pub fn is_saved(&self) -> bool {
        matches!(self, Persisted::Saved)
    }

    /// Message for the user when the mirror could not be written.
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            Persisted::Saved => None,
            Persisted::Failed(_) => Some("Could not save shows. Storage might be full."),
        }
    }
}

pub struct ShowStore {
    shows: Vec<Show>,
    slot: Box<dyn SnapshotSlot>,
    revision: u64,
    /// Set when an existing snapshot could neither be loaded nor copied
    /// aside; writes are refused so it is not overwritten.
    protected: bool,
}

impl ShowStore {
    /// Rehydrates from the slot. A missing snapshot yields an empty store; an
    /// unreadable one is quarantined first so it is not lost on the next write.
    pub fn load(mut slot: Box<dyn SnapshotSlot>) -> Self {
        let mut protected = false;
        let shows = match slot.read() {
            Ok(None) => Vec::new(),
            Ok(Some(contents)) => match decode_snapshot(&contents) {
                Ok(shows) => {
                    tracing::info!("loaded {} shows from storage", shows.len());
                    shows
                }
                Err(err) => {
                    tracing::error!("failed to load shows from storage: {err}");
                    if let Err(err) = slot.quarantine(&contents) {
                        tracing::error!("failed to keep unreadable snapshot: {err}");
                        protected = true;
                    }
                    Vec::new()
                }
            },
            Err(err) => {
                tracing::error!("failed to read shows from storage: {err}");
                protected = true;
                Vec::new()
            }
        };

        Self {
            shows,
            slot,
            revision: 0,
            protected,
        }
    }

    pub fn shows(&self) -> &[Show] {
        &self.shows
    }

    pub fn len(&self) -> usize {
        self.shows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shows.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Show> {
        self.shows.iter().find(|show| show.id == id)
    }

    /// Bumped on every mutation so views know when to re-derive.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn append(&mut self, show: Show) -> Persisted {
        self.shows.push(show);
        self.revision += 1;
        match self.persist() {
            Ok(()) => Persisted::Saved,
            Err(err) => {
                tracing::error!("failed to save shows to storage: {err}");
                Persisted::Failed(err)
            }
        }
    }

    /// Embeds pending media, assigns an id and appends.
    pub fn commit(&mut self, new_show: NewShow) -> (String, Persisted) {
        let mut new_show = new_show;
        new_show.media = new_show.media.into_iter().map(media::promote).collect();
        let id = Uuid::new_v4().to_string();
        let persisted = self.append(Show::from_new(id.clone(), new_show));
        (id, persisted)
    }

    pub fn persist(&mut self) -> Result<(), StoreError> {
        if self.protected {
            return Err(StoreError::Protected);
        }
        let contents = encode_snapshot(&self.shows)?;
        self.slot.write(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Media, MediaKind, Vibe};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn show(id: &str, artist: &str, ymd: (i32, u32, u32)) -> Show {
        Show {
            id: id.to_string(),
            artist: artist.to_string(),
            date: NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap(),
            location: "Somewhere".to_string(),
            vibe: Vibe::Chill,
            media: vec![Media {
                id: format!("{id}-m"),
                kind: MediaKind::Image,
                url: "data:image/png;base64,AA==".to_string(),
                file: None,
            }],
        }
    }

    #[test]
    fn empty_slot_loads_empty_store() {
        let store = ShowStore::load(Box::new(MemorySlot::default()));
        assert!(store.is_empty());
    }

    #[test]
    fn appends_keep_insertion_order_and_write_through() {
        let slot = MemorySlot::default();
        let mut store = ShowStore::load(Box::new(slot.clone()));

        for (i, artist) in ["Blur", "Pulp", "Suede"].iter().enumerate() {
            let before = store.len();
            assert!(store.append(show(&i.to_string(), artist, (2000 - i as i32, 1, 1))).is_saved());
            assert_eq!(store.len(), before + 1);
        }

        let artists: Vec<_> = store.shows().iter().map(|s| s.artist.as_str()).collect();
        assert_eq!(artists, ["Blur", "Pulp", "Suede"]);
        assert_eq!(slot.writes(), 3);
        assert_eq!(store.revision(), 3);
    }

    #[test]
    fn reload_round_trips_field_for_field() {
        let slot = MemorySlot::default();
        let mut store = ShowStore::load(Box::new(slot.clone()));
        let _ = store.append(show("a", "Bjork", (2019, 6, 2)));
        let _ = store.append(show("b", "Portishead", (2022, 8, 20)));

        let reloaded = ShowStore::load(Box::new(slot));
        assert_eq!(reloaded.shows(), store.shows());
    }

    #[test]
    fn failed_write_keeps_the_show() {
        let slot = MemorySlot::default();
        slot.fail_writes(true);
        let mut store = ShowStore::load(Box::new(slot.clone()));

        let persisted = store.append(show("a", "Idles", (2021, 3, 3)));
        assert!(!persisted.is_saved());
        assert!(persisted.warning().is_some());
        assert_eq!(store.len(), 1);
        assert!(slot.contents().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_quarantined() {
        let slot = MemorySlot::with_contents("{not json");
        let store = ShowStore::load(Box::new(slot.clone()));
        assert!(store.is_empty());
        assert_eq!(slot.quarantined(), vec![b"{not json".to_vec()]);
    }

    #[test]
    fn non_utf8_snapshot_is_set_aside_before_overwrite() {
        let dir = TempDir::new().unwrap();
        let original: &[u8] = b"[{\"artist\":\"caf\xe9\"}]";
        fs::write(dir.path().join("showVaultShows.json"), original).unwrap();

        let mut store = ShowStore::load(Box::new(FileSlot::new(dir.path(), SNAPSHOT_SLOT)));
        assert!(store.is_empty());
        assert!(store.append(show("a", "Low", (2019, 4, 4))).is_saved());

        let copies: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".corrupt-"))
            .map(|entry| fs::read(entry.path()).unwrap())
            .collect();
        assert_eq!(copies, vec![original.to_vec()]);
    }

    #[test]
    fn unreadable_slot_is_never_overwritten() {
        let slot = MemorySlot::with_contents(r#"{"version":1,"shows":[]}"#);
        slot.fail_reads(true);
        let mut store = ShowStore::load(Box::new(slot.clone()));

        let persisted = store.append(show("a", "Wire", (1978, 1, 1)));
        assert!(matches!(persisted, Persisted::Failed(StoreError::Protected)));
        assert_eq!(store.len(), 1);
        assert_eq!(slot.writes(), 0);
        assert_eq!(
            slot.contents().as_deref(),
            Some(br#"{"version":1,"shows":[]}"#.as_slice())
        );
    }

    #[test]
    fn future_snapshot_version_is_not_trusted() {
        let slot = MemorySlot::with_contents(r#"{"version": 7, "shows": []}"#);
        let store = ShowStore::load(Box::new(slot.clone()));
        assert!(store.is_empty());
        assert_eq!(slot.quarantined().len(), 1);
    }

    #[test]
    fn legacy_array_snapshot_is_accepted() {
        let legacy = r#"[{"id":"x","artist":"Caetano Veloso","date":"2018-10-12",
            "location":"Circo Voador","vibe":"Nostálgico",
            "media":[{"id":"m","type":"video","url":"data:video/mp4;base64,AA=="}]}]"#;
        let store = ShowStore::load(Box::new(MemorySlot::with_contents(legacy)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.shows()[0].vibe, Vibe::Nostalgic);
        assert_eq!(store.shows()[0].media[0].kind, MediaKind::Video);
    }

    #[test]
    fn file_slot_round_trip_and_quarantine() {
        let dir = TempDir::new().unwrap();
        let mut store = ShowStore::load(Box::new(FileSlot::new(dir.path(), SNAPSHOT_SLOT)));
        let _ = store.append(show("a", "Fugazi", (1999, 9, 9)));

        let slot = FileSlot::new(dir.path(), SNAPSHOT_SLOT);
        assert!(slot.path().exists());
        let reloaded = ShowStore::load(Box::new(slot));
        assert_eq!(reloaded.shows(), store.shows());

        fs::write(dir.path().join("showVaultShows.json"), "garbage").unwrap();
        let broken = ShowStore::load(Box::new(FileSlot::new(dir.path(), SNAPSHOT_SLOT)));
        assert!(broken.is_empty());
        let aside = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(aside, 1);
    }

    #[test]
    fn commit_promotes_media_and_assigns_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crowd.jpg");
        fs::write(&path, b"jpg").unwrap();
        let pending = crate::media::pending_media(&path).unwrap();

        let mut store = ShowStore::load(Box::new(MemorySlot::default()));
        let (id, persisted) = store.commit(NewShow {
            artist: "Arctic Monkeys".into(),
            date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            location: "Royal Albert Hall".into(),
            vibe: Vibe::Euphoric,
            media: vec![pending],
        });
        assert!(persisted.is_saved());

        let saved = store.get(&id).unwrap();
        assert!(saved.media[0].url.starts_with("data:image/jpeg;base64,"));
        assert!(saved.media[0].file.is_none());
    }
}
