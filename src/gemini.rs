use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    config::AppConfig,
    media::EncodedMedia,
    models::{Citation, CitationSource},
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API credential is not configured")]
    MissingCredential,
    #[error("http error: {0}")]
    Http(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("response carried no {0}")]
    Empty(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Part {
    Text(String),
    Inline(EncodedMedia),
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Grounding {
    #[default]
    None,
    WebSearch,
    Maps { latitude: f64, longitude: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContentRequest {
    pub model: String,
    pub parts: Vec<Part>,
    pub grounding: Grounding,
    pub thinking_budget: Option<u32>,
    /// Ask for image parts instead of text.
    pub image_output: bool,
}

impl ContentRequest {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            parts: Vec::new(),
            grounding: Grounding::None,
            thinking_budget: None,
            image_output: false,
        }
    }

    pub fn inline(mut self, media: &EncodedMedia) -> Self {
        self.parts.push(Part::Inline(media.clone()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text(text.into()));
        self
    }

    pub fn grounding(mut self, grounding: Grounding) -> Self {
        self.grounding = grounding;
        self
    }

    pub fn thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn image_output(mut self) -> Self {
        self.image_output = true;
        self
    }

    /// Concatenated text parts, mostly useful for logging and tests.
    pub fn prompt(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::Inline(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct ContentResponse {
    pub text: String,
    pub images: Vec<EncodedMedia>,
    pub citations: Vec<Citation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: String,
}

/// The two request shapes the generative provider offers.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_content(&self, request: &ContentRequest)
        -> Result<ContentResponse, GatewayError>;

    async fn generate_images(&self, request: &ImageRequest)
        -> Result<Vec<EncodedMedia>, GatewayError>;
}

pub struct GeminiClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: &AppConfig, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("falling back to default http client: {err}");
                Client::new()
            });
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    async fn post(&self, url: String, payload: &Value) -> Result<String, GatewayError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(GatewayError::MissingCredential)?;

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", key)
            .json(payload)
            .send()
            .await
            .map_err(|err| GatewayError::Http(err.to_string()))?;

        let status = response.status();
        let text_body = response
            .text()
            .await
            .map_err(|err| GatewayError::Http(err.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text_body,
            });
        }
        Ok(text_body)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(
        &self,
        request: &ContentRequest,
    ) -> Result<ContentResponse, GatewayError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = self.post(url, &content_payload(request)).await?;
        parse_content_response(&body)
    }

    async fn generate_images(
        &self,
        request: &ImageRequest,
    ) -> Result<Vec<EncodedMedia>, GatewayError> {
        let url = format!("{}/models/{}:predict", self.base_url, request.model);
        let body = self.post(url, &image_payload(request)).await?;
        parse_image_response(&body)
    }
}

fn content_payload(request: &ContentRequest) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => json!({ "text": text }),
            Part::Inline(media) => json!({
                "inlineData": { "mimeType": media.content_type, "data": media.data }
            }),
        })
        .collect();

    let mut payload = json!({
        "contents": [{ "role": "user", "parts": parts }],
    });

    match request.grounding {
        Grounding::None => {}
        Grounding::WebSearch => {
            payload["tools"] = json!([{ "googleSearch": {} }]);
        }
        Grounding::Maps {
            latitude,
            longitude,
        } => {
            payload["tools"] = json!([{ "googleMaps": {} }]);
            payload["toolConfig"] = json!({
                "retrievalConfig": { "latLng": { "latitude": latitude, "longitude": longitude } }
            });
        }
    }

    let mut generation = serde_json::Map::new();
    if let Some(budget) = request.thinking_budget {
        generation.insert("thinkingConfig".into(), json!({ "thinkingBudget": budget }));
    }
    if request.image_output {
        generation.insert("responseModalities".into(), json!(["IMAGE"]));
    }
    if !generation.is_empty() {
        payload["generationConfig"] = Value::Object(generation);
    }

    payload
}

fn image_payload(request: &ImageRequest) -> Value {
    json!({
        "instances": [{ "prompt": request.prompt }],
        "parameters": {
            "sampleCount": 1,
            "aspectRatio": request.aspect_ratio,
            "outputMimeType": "image/jpeg",
        },
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentDoc {
    #[serde(default)]
    candidates: Vec<CandidateDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateDoc {
    content: Option<ContentDoc>,
    grounding_metadata: Option<GroundingMetadataDoc>,
}

#[derive(Debug, Deserialize)]
struct ContentDoc {
    #[serde(default)]
    parts: Vec<PartDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartDoc {
    text: Option<String>,
    inline_data: Option<InlineDataDoc>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataDoc {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadataDoc {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunkDoc>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunkDoc {
    web: Option<SourceDoc>,
    maps: Option<SourceDoc>,
}

#[derive(Debug, Deserialize)]
struct SourceDoc {
    uri: Option<String>,
    title: Option<String>,
}

fn parse_content_response(body: &str) -> Result<ContentResponse, GatewayError> {
    let doc: GenerateContentDoc =
        serde_json::from_str(body).map_err(|err| GatewayError::Parse(err.to_string()))?;

    let Some(candidate) = doc.candidates.into_iter().next() else {
        return Ok(ContentResponse::default());
    };

    let mut text = String::new();
    let mut images = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if part.thought {
            continue;
        }
        if let Some(chunk) = part.text {
            text.push_str(&chunk);
        }
        if let Some(inline) = part.inline_data {
            images.push(EncodedMedia {
                content_type: inline.mime_type,
                data: inline.data,
            });
        }
    }

    let citations = candidate
        .grounding_metadata
        .map(|meta| meta.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|chunk| {
            let (source, doc) = match (chunk.web, chunk.maps) {
                (Some(web), _) => (CitationSource::Web, web),
                (None, Some(maps)) => (CitationSource::Maps, maps),
                (None, None) => return None,
            };
            let uri = doc.uri?;
            Some(Citation {
                source,
                title: doc.title.unwrap_or_else(|| uri.clone()),
                uri,
            })
        })
        .collect();

    Ok(ContentResponse {
        text,
        images,
        citations,
    })
}

#[derive(Debug, Deserialize)]
struct PredictDoc {
    #[serde(default)]
    predictions: Vec<PredictionDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionDoc {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

fn parse_image_response(body: &str) -> Result<Vec<EncodedMedia>, GatewayError> {
    let doc: PredictDoc =
        serde_json::from_str(body).map_err(|err| GatewayError::Parse(err.to_string()))?;
    Ok(doc
        .predictions
        .into_iter()
        .filter_map(|prediction| {
            let data = prediction.bytes_base64_encoded.filter(|d| !d.is_empty())?;
            Some(EncodedMedia {
                content_type: prediction
                    .mime_type
                    .unwrap_or_else(|| "image/jpeg".to_string()),
                data,
            })
        })
        .collect())
}
