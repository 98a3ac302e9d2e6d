//! One call per AI capability. Public operations never fail: errors are
//! logged and turned into the placeholder the caller can show as-is.

use std::sync::Arc;

use crate::{
    config::AppConfig,
    gemini::{ContentRequest, GatewayError, GenerativeBackend, Grounding},
    media::EncodedMedia,
    models::{GroundedText, Show},
    poster::{self, AspectRatio},
};

pub const UNIDENTIFIED_ARTIST: &str = "Could not identify the artist.";
pub const MISSING_ARTIST: &str = "Please provide an artist name.";
pub const PLAYLIST_FAILED: &str = "Could not fetch playlist suggestions.";
pub const VENUES_FAILED: &str = "Could not find nearby venues.";
pub const DEEP_DIVE_FAILED: &str = "Failed to get a deep-dive analysis.";
pub const PHOTO_ANALYSIS_FAILED: &str = "Could not analyze the photo.";
pub const FRAME_ANALYSIS_FAILED: &str = "Could not analyze the video frame.";
pub const TRANSCRIPTION_FAILED: &str = "Could not transcribe the audio.";

const IDENTIFY_PROMPT: &str = "Analyze this concert photo. \
    Identify the main artist or band performing. \
    If visible, also identify the event or venue name. \
    Reply with only the artist or band name.";

const VENUES_PROMPT: &str = "List music venues and concert halls near my current location.";

const FRAME_PROMPT: &str = "This is a frame from a concert video. \
    Based on this image, describe the energy, the mood and the potential key moments \
    of the performance in one short paragraph.";

const PHOTO_PROMPT: &str = "Analyze this image in detail. \
    First, determine its context (e.g. concert, public event, portrait, selfie).\n\
    - If it is a concert or live event, identify the artist/band and the venue if possible. \
    Describe the atmosphere of the event.\n\
    - If it shows a famous person, identify them and give a short biography \
    and a few interesting recent facts.\n\
    - If the context or the person is unclear, describe the content and visual elements \
    of the image.\n\
    Use Google Search for the most current information. Give a comprehensive answer.";

const TRANSCRIBE_PROMPT: &str = "Transcribe this audio file accurately.";

/// True when an identification result is the "could not" sentinel (or any
/// model reply phrased that way) rather than a name.
pub fn is_unidentified(answer: &str) -> bool {
    answer.trim().is_empty() || answer.to_lowercase().contains("could not")
}

#[derive(Clone)]
pub struct AiGateway {
    backend: Arc<dyn GenerativeBackend>,
    config: AppConfig,
}

impl AiGateway {
    pub fn new(backend: Arc<dyn GenerativeBackend>, config: AppConfig) -> Self {
        Self { backend, config }
    }

    pub async fn identify_artist(&self, image: &EncodedMedia) -> String {
        let request = ContentRequest::new(&self.config.text_model)
            .inline(image)
            .text(IDENTIFY_PROMPT);
        match self.try_text(&request).await {
            Ok(name) => name,
            Err(err) => {
                tracing::error!("error analyzing image for artist: {err}");
                UNIDENTIFIED_ARTIST.to_string()
            }
        }
    }

    pub async fn suggest_playlist(&self, artist: &str) -> GroundedText {
        let artist = artist.trim();
        if artist.is_empty() {
            return GroundedText::plain(MISSING_ARTIST);
        }
        let request = ContentRequest::new(&self.config.text_model)
            .text(format!(
                "Find a popular concert setlist or playlist for the artist \"{artist}\". \
                 Give a short description and a link."
            ))
            .grounding(Grounding::WebSearch);
        self.grounded(&request, "suggesting playlist", PLAYLIST_FAILED)
            .await
    }

    pub async fn find_nearby_venues(&self, latitude: f64, longitude: f64) -> GroundedText {
        let request = ContentRequest::new(&self.config.text_model)
            .text(VENUES_PROMPT)
            .grounding(Grounding::Maps {
                latitude,
                longitude,
            });
        self.grounded(&request, "finding nearby venues", VENUES_FAILED)
            .await
    }

    pub async fn deep_dive(&self, show: &Show, question: &str) -> String {
        let request = ContentRequest::new(&self.config.reasoning_model)
            .text(deep_dive_prompt(show, question))
            .thinking_budget(self.config.thinking_budget);
        match self.try_text(&request).await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::error!("error getting deep dive: {err}");
                DEEP_DIVE_FAILED.to_string()
            }
        }
    }

    /// Returns the edited image as a data URL.
    pub async fn edit_image(&self, image: &EncodedMedia, instruction: &str) -> Option<String> {
        let request = ContentRequest::new(&self.config.image_edit_model)
            .inline(image)
            .text(instruction)
            .image_output();
        match self.try_image(&request).await {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::error!("error editing image: {err}");
                None
            }
        }
    }

    pub async fn generate_poster(
        &self,
        subject: &str,
        aspect_ratio: AspectRatio,
    ) -> Option<String> {
        poster::generate_poster(self.backend.as_ref(), &self.config, subject, aspect_ratio).await
    }

    pub async fn analyze_photo(&self, image: &EncodedMedia) -> GroundedText {
        let request = ContentRequest::new(&self.config.text_model)
            .inline(image)
            .text(PHOTO_PROMPT)
            .grounding(Grounding::WebSearch);
        self.grounded(&request, "analyzing photo details", PHOTO_ANALYSIS_FAILED)
            .await
    }

    pub async fn analyze_video_frame(&self, frame: &EncodedMedia) -> String {
        let request = ContentRequest::new(&self.config.reasoning_model)
            .inline(frame)
            .text(FRAME_PROMPT);
        match self.try_text(&request).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("error analyzing video frame: {err}");
                FRAME_ANALYSIS_FAILED.to_string()
            }
        }
    }

    pub async fn transcribe_audio(&self, clip: &EncodedMedia) -> String {
        let request = ContentRequest::new(&self.config.text_model)
            .inline(clip)
            .text(TRANSCRIBE_PROMPT);
        match self.try_text(&request).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("error transcribing audio: {err}");
                TRANSCRIPTION_FAILED.to_string()
            }
        }
    }

    pub async fn try_text(&self, request: &ContentRequest) -> Result<String, GatewayError> {
        let response = self.backend.generate_content(request).await?;
        let text = response.text.trim();
        if text.is_empty() {
            return Err(GatewayError::Empty("text"));
        }
        Ok(text.to_string())
    }

    pub async fn try_image(&self, request: &ContentRequest) -> Result<String, GatewayError> {
        let response = self.backend.generate_content(request).await?;
        response
            .images
            .first()
            .map(EncodedMedia::to_data_url)
            .ok_or(GatewayError::Empty("image data"))
    }

    async fn grounded(
        &self,
        request: &ContentRequest,
        action: &str,
        apology: &str,
    ) -> GroundedText {
        match self.backend.generate_content(request).await {
            Ok(response) if !response.text.trim().is_empty() => GroundedText {
                text: response.text,
                citations: response.citations,
            },
            Ok(_) => {
                tracing::error!("error {action}: {}", GatewayError::Empty("text"));
                GroundedText::plain(apology)
            }
            Err(err) => {
                tracing::error!("error {action}: {err}");
                GroundedText::plain(apology)
            }
        }
    }
}

fn deep_dive_prompt(show: &Show, question: &str) -> String {
    format!(
        "About the {artist} show at {location} on {date}, \
         please answer the following complex question: {question}. \
         Give a detailed analysis that considers the artist's career trajectory at the time, \
         the cultural context and the significance of the event.",
        artist = show.artist,
        location = show.location,
        date = show.date.format("%Y-%m-%d"),
        question = question.trim(),
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{collections::VecDeque, sync::Mutex};

    use async_trait::async_trait;

    use crate::{
        gemini::{ContentRequest, ContentResponse, GatewayError, GenerativeBackend, ImageRequest},
        media::EncodedMedia,
    };

    /// Replays queued results in order and records every request.
    #[derive(Default)]
    pub struct ScriptedBackend {
        content: Mutex<VecDeque<Result<ContentResponse, GatewayError>>>,
        images: Mutex<VecDeque<Result<Vec<EncodedMedia>, GatewayError>>>,
        content_calls: Mutex<Vec<ContentRequest>>,
        image_calls: Mutex<Vec<ImageRequest>>,
    }

    impl ScriptedBackend {
        pub fn push_content(&self, result: Result<ContentResponse, GatewayError>) {
            self.content.lock().unwrap().push_back(result);
        }

        pub fn push_text(&self, text: &str) {
            self.push_content(Ok(ContentResponse {
                text: text.to_string(),
                ..Default::default()
            }));
        }

        pub fn push_images(&self, result: Result<Vec<EncodedMedia>, GatewayError>) {
            self.images.lock().unwrap().push_back(result);
        }

        pub fn content_requests(&self) -> Vec<ContentRequest> {
            self.content_calls.lock().unwrap().clone()
        }

        pub fn image_requests(&self) -> Vec<ImageRequest> {
            self.image_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn generate_content(
            &self,
            request: &ContentRequest,
        ) -> Result<ContentResponse, GatewayError> {
            self.content_calls.lock().unwrap().push(request.clone());
            self.content
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::Empty("scripted content")))
        }

        async fn generate_images(
            &self,
            request: &ImageRequest,
        ) -> Result<Vec<EncodedMedia>, GatewayError> {
            self.image_calls.lock().unwrap().push(request.clone());
            self.images
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::Empty("scripted images")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedBackend;
    use super::*;
    use crate::gemini::ContentResponse;
    use crate::models::{Citation, CitationSource, Vibe};
    use chrono::NaiveDate;

    fn gateway() -> (Arc<ScriptedBackend>, AiGateway) {
        let backend = Arc::new(ScriptedBackend::default());
        let gateway = AiGateway::new(backend.clone(), AppConfig::default());
        (backend, gateway)
    }

    fn photo() -> EncodedMedia {
        EncodedMedia::from_bytes("image/jpeg", b"stage")
    }

    #[tokio::test]
    async fn identify_artist_trims_the_answer() {
        let (backend, gateway) = gateway();
        backend.push_text("  Arctic Monkeys\n");
        assert_eq!(gateway.identify_artist(&photo()).await, "Arctic Monkeys");

        let request = &backend.content_requests()[0];
        assert_eq!(request.model, "gemini-2.5-flash");
        assert!(matches!(request.parts[0], crate::gemini::Part::Inline(_)));
    }

    #[tokio::test]
    async fn identify_artist_failure_returns_sentinel() {
        let (backend, gateway) = gateway();
        backend.push_content(Err(GatewayError::MissingCredential));
        let answer = gateway.identify_artist(&photo()).await;
        assert_eq!(answer, UNIDENTIFIED_ARTIST);
        assert!(is_unidentified(&answer));
        assert!(!is_unidentified("The Strokes"));
    }

    #[tokio::test]
    async fn playlist_requires_an_artist_and_keeps_citations() {
        let (backend, gateway) = gateway();
        let empty = gateway.suggest_playlist("  ").await;
        assert_eq!(empty.text, MISSING_ARTIST);
        assert!(backend.content_requests().is_empty());

        let citation = Citation {
            source: CitationSource::Web,
            uri: "https://setlist.fm".into(),
            title: "setlist.fm".into(),
        };
        backend.push_content(Ok(ContentResponse {
            text: "AM tour setlist".into(),
            citations: vec![citation.clone()],
            ..Default::default()
        }));
        let found = gateway.suggest_playlist("Arctic Monkeys").await;
        assert_eq!(found.citations, vec![citation]);
        assert!(backend.content_requests()[0].prompt().contains("\"Arctic Monkeys\""));
    }

    #[tokio::test]
    async fn venues_are_grounded_on_coordinates() {
        let (backend, gateway) = gateway();
        backend.push_content(Err(GatewayError::Http("dns".into())));
        let answer = gateway.find_nearby_venues(-23.55, -46.63).await;
        assert_eq!(answer, GroundedText::plain(VENUES_FAILED));
        assert_eq!(
            backend.content_requests()[0].grounding,
            Grounding::Maps {
                latitude: -23.55,
                longitude: -46.63
            }
        );
    }

    #[tokio::test]
    async fn deep_dive_uses_reasoning_model_with_budget() {
        let (backend, gateway) = gateway();
        backend.push_text("It mattered.");
        let show = Show {
            id: "s".into(),
            artist: "Radiohead".into(),
            date: NaiveDate::from_ymd_opt(1997, 6, 28).unwrap(),
            location: "Glastonbury".into(),
            vibe: Vibe::Euphoric,
            media: Vec::new(),
        };
        assert_eq!(gateway.deep_dive(&show, "Why?").await, "It mattered.");

        let request = &backend.content_requests()[0];
        assert_eq!(request.model, "gemini-2.5-pro");
        assert_eq!(request.thinking_budget, Some(32768));
        assert!(request.prompt().contains("Radiohead show at Glastonbury on 1997-06-28"));

        backend.push_text("   ");
        assert_eq!(gateway.deep_dive(&show, "Why?").await, DEEP_DIVE_FAILED);
    }

    #[tokio::test]
    async fn edit_image_returns_data_url_or_none() {
        let (backend, gateway) = gateway();
        backend.push_content(Ok(ContentResponse {
            images: vec![EncodedMedia {
                content_type: "image/png".into(),
                data: "AQID".into(),
            }],
            ..Default::default()
        }));
        assert_eq!(
            gateway.edit_image(&photo(), "grainy film").await.as_deref(),
            Some("data:image/png;base64,AQID")
        );
        assert!(backend.content_requests()[0].image_output);

        backend.push_text("I can't draw that");
        assert!(gateway.edit_image(&photo(), "grainy film").await.is_none());
    }

    #[tokio::test]
    async fn analysis_and_transcription_degrade_to_apologies() {
        let (backend, gateway) = gateway();
        backend.push_content(Err(GatewayError::Parse("bad".into())));
        backend.push_content(Err(GatewayError::Parse("bad".into())));
        backend.push_content(Err(GatewayError::Parse("bad".into())));

        assert_eq!(
            gateway.analyze_photo(&photo()).await,
            GroundedText::plain(PHOTO_ANALYSIS_FAILED)
        );
        assert_eq!(gateway.analyze_video_frame(&photo()).await, FRAME_ANALYSIS_FAILED);
        let clip = EncodedMedia::from_bytes("audio/webm", b"ogg");
        assert_eq!(gateway.transcribe_audio(&clip).await, TRANSCRIPTION_FAILED);
    }
}
