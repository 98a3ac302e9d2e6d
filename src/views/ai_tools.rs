//! The AI tool panel: a carousel of tools, each running at most one request
//! at a time as a spawned task.

use std::{future::Future, path::Path};

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::{
    devices::{Microphone, PermissionError, RecordingSession},
    gateway::AiGateway,
    media::{EncodedMedia, MediaError},
    models::{GroundedText, Show},
    poster::AspectRatio,
    store::ShowStore,
};

pub const DEFAULT_POSTER_SUBJECT: &str = "Bring Me The Horizon";
pub const DEFAULT_DIVE_QUESTION: &str =
    "What was the cultural impact of this show on the local scene?";
pub const DEFAULT_EDIT_INSTRUCTION: &str = "Add a grainy retro film filter";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    Poster,
    DeepDive,
    MediaEditor,
    MediaAnalyzer,
    Transcription,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::Poster,
        ToolKind::DeepDive,
        ToolKind::MediaEditor,
        ToolKind::MediaAnalyzer,
        ToolKind::Transcription,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ToolKind::Poster => "Poster Generator",
            ToolKind::DeepDive => "Deep Dive",
            ToolKind::MediaEditor => "Media Editor",
            ToolKind::MediaAnalyzer => "Media Analyzer",
            ToolKind::Transcription => "Audio Transcription",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::Poster => "Create a unique poster for a real or imaginary show.",
            ToolKind::DeepDive => "Ask complex questions about one of your saved shows.",
            ToolKind::MediaEditor => "Edit your show photos with text prompts.",
            ToolKind::MediaAnalyzer => "Upload any photo and get a detailed analysis.",
            ToolKind::Transcription => "Record audio and have it transcribed for you.",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Carousel {
    index: usize,
}

impl Carousel {
    pub fn current(&self) -> ToolKind {
        ToolKind::ALL[self.index]
    }

    pub fn next(&mut self) -> ToolKind {
        self.index = (self.index + 1) % ToolKind::ALL.len();
        self.current()
    }

    pub fn prev(&mut self) -> ToolKind {
        self.index = (self.index + ToolKind::ALL.len() - 1) % ToolKind::ALL.len();
        self.current()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("{} is already running", .0.title())]
    Busy(ToolKind),
    #[error("{0} is required")]
    MissingInput(&'static str),
    #[error("{0}")]
    Permission(#[from] PermissionError),
}

/// One in-flight request and its last result. Loading means a task handle
/// exists and has not finished; dropping the slot detaches the task.
pub struct ToolTask<T> {
    handle: Option<JoinHandle<T>>,
    result: Option<T>,
}

impl<T> Default for ToolTask<T> {
    fn default() -> Self {
        Self {
            handle: None,
            result: None,
        }
    }
}

impl<T: Send + 'static> ToolTask<T> {
    pub fn is_loading(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn start<F>(&mut self, kind: ToolKind, work: F) -> Result<(), ToolError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        if self.is_loading() {
            return Err(ToolError::Busy(kind));
        }
        // A finished run nobody collected is superseded.
        self.result = None;
        self.handle = Some(tokio::spawn(work));
        Ok(())
    }

    /// Waits for the in-flight request, if any, and keeps its result.
    pub async fn finish(&mut self) -> Option<&T> {
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(value) => self.result = Some(value),
                Err(err) => tracing::error!("tool task did not complete: {err}"),
            }
        }
        self.result.as_ref()
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }
}

pub struct AiTools {
    gateway: AiGateway,
    pub carousel: Carousel,
    active: Option<ToolKind>,

    pub poster_subject: String,
    pub aspect_ratio: AspectRatio,
    pub poster: ToolTask<Option<String>>,

    selected_show: Option<Show>,
    pub dive_question: String,
    pub dive: ToolTask<String>,

    edit_source: Option<EncodedMedia>,
    pub edit_instruction: String,
    pub edit: ToolTask<Option<String>>,

    photo: Option<EncodedMedia>,
    pub analysis: ToolTask<GroundedText>,

    recording: Option<RecordingSession>,
    recording_error: Option<String>,
    pub transcription: ToolTask<String>,
}

impl AiTools {
    pub fn new(gateway: AiGateway, store: &ShowStore) -> Self {
        Self {
            gateway,
            carousel: Carousel::default(),
            active: None,
            poster_subject: DEFAULT_POSTER_SUBJECT.to_string(),
            aspect_ratio: AspectRatio::default(),
            poster: ToolTask::default(),
            selected_show: store.shows().first().cloned(),
            dive_question: DEFAULT_DIVE_QUESTION.to_string(),
            dive: ToolTask::default(),
            edit_source: None,
            edit_instruction: DEFAULT_EDIT_INSTRUCTION.to_string(),
            edit: ToolTask::default(),
            photo: None,
            analysis: ToolTask::default(),
            recording: None,
            recording_error: None,
            transcription: ToolTask::default(),
        }
    }

    pub fn active(&self) -> Option<ToolKind> {
        self.active
    }

    pub fn open(&mut self, kind: ToolKind) {
        if self.active.is_some() && self.active != Some(kind) {
            self.close();
        }
        self.active = Some(kind);
    }

    /// Closes the panel: stops any recording (releasing the microphone) and
    /// forgets every tool's state. In-flight requests keep running but their
    /// results are discarded.
    pub fn close(&mut self) {
        self.recording = None;
        self.recording_error = None;
        self.active = None;
        self.poster = ToolTask::default();
        self.dive = ToolTask::default();
        self.edit_source = None;
        self.edit = ToolTask::default();
        self.photo = None;
        self.analysis = ToolTask::default();
        self.transcription = ToolTask::default();
    }

    pub fn select_show(&mut self, store: &ShowStore, id: &str) -> bool {
        self.selected_show = store.get(id).cloned();
        self.selected_show.is_some()
    }

    pub fn selected_show(&self) -> Option<&Show> {
        self.selected_show.as_ref()
    }

    pub fn start_poster(&mut self) -> Result<(), ToolError> {
        let subject = self.poster_subject.trim().to_string();
        if subject.is_empty() {
            return Err(ToolError::MissingInput("a poster subject"));
        }
        let gateway = self.gateway.clone();
        let aspect_ratio = self.aspect_ratio;
        self.poster.start(ToolKind::Poster, async move {
            gateway.generate_poster(&subject, aspect_ratio).await
        })
    }

    pub fn start_deep_dive(&mut self) -> Result<(), ToolError> {
        let show = self
            .selected_show
            .clone()
            .ok_or(ToolError::MissingInput("a saved show"))?;
        let question = self.dive_question.clone();
        let gateway = self.gateway.clone();
        self.dive.start(ToolKind::DeepDive, async move {
            gateway.deep_dive(&show, &question).await
        })
    }

    pub fn select_image_for_edit(&mut self, path: &Path) -> Result<(), MediaError> {
        self.edit_source = Some(EncodedMedia::from_path(path)?);
        self.edit = ToolTask::default();
        Ok(())
    }

    /// Stored shows already hold their images as data URLs.
    pub fn select_data_url_for_edit(&mut self, url: &str) -> Result<(), MediaError> {
        self.edit_source = Some(EncodedMedia::parse_data_url(url)?);
        self.edit = ToolTask::default();
        Ok(())
    }

    pub fn start_edit(&mut self) -> Result<(), ToolError> {
        let source = self
            .edit_source
            .clone()
            .ok_or(ToolError::MissingInput("an image to edit"))?;
        let instruction = self.edit_instruction.trim().to_string();
        if instruction.is_empty() {
            return Err(ToolError::MissingInput("an edit instruction"));
        }
        let gateway = self.gateway.clone();
        self.edit.start(ToolKind::MediaEditor, async move {
            gateway.edit_image(&source, &instruction).await
        })
    }

    pub fn select_photo(&mut self, path: &Path) -> Result<(), MediaError> {
        self.photo = Some(EncodedMedia::from_path(path)?);
        self.analysis = ToolTask::default();
        Ok(())
    }

    pub fn start_analysis(&mut self) -> Result<(), ToolError> {
        let photo = self
            .photo
            .clone()
            .ok_or(ToolError::MissingInput("a photo"))?;
        let gateway = self.gateway.clone();
        self.analysis.start(ToolKind::MediaAnalyzer, async move {
            gateway.analyze_photo(&photo).await
        })
    }

    pub fn is_recording(&self) -> bool {
        self.recording.as_ref().is_some_and(RecordingSession::is_recording)
    }

    /// Explanation shown instead of a transcript when the microphone was refused.
    pub fn recording_error(&self) -> Option<&str> {
        self.recording_error.as_deref()
    }

    pub fn start_recording(&mut self, microphone: &mut dyn Microphone) -> Result<(), ToolError> {
        if self.is_recording() || self.transcription.is_loading() {
            return Err(ToolError::Busy(ToolKind::Transcription));
        }
        self.transcription = ToolTask::default();
        match RecordingSession::start(microphone) {
            Ok(session) => {
                self.recording_error = None;
                self.recording = Some(session);
                Ok(())
            }
            Err(err) => {
                self.recording_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Stops the microphone and sends the clip off for transcription.
    pub fn stop_recording(&mut self) -> Result<(), ToolError> {
        let session = self
            .recording
            .take()
            .ok_or(ToolError::MissingInput("an active recording"))?;
        let clip = session.stop();
        let gateway = self.gateway.clone();
        self.transcription.start(ToolKind::Transcription, async move {
            gateway.transcribe_audio(&clip).await
        })
    }
}
