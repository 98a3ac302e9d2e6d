//! Poster generation: a web-grounded description first, then an ordered list
//! of image strategies tried until one yields an image.

use std::{fmt, str::FromStr};

use crate::{
    config::AppConfig,
    gemini::{ContentRequest, GatewayError, GenerativeBackend, Grounding, ImageRequest},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Square,
    Landscape,
    Portrait,
    Standard,
    Tall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Standard,
        AspectRatio::Tall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Standard => "4:3",
            AspectRatio::Tall => "3:4",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| {
                let options = AspectRatio::ALL.map(|r| r.as_str()).join(", ");
                format!("unsupported aspect ratio '{s}' (expected one of: {options})")
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptKind {
    /// The web-grounded description from the first step.
    Detailed,
    /// Subject name only.
    Minimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Engine {
    /// Dedicated image generation model.
    ImageModel,
    /// Multimodal content model asked for image output.
    ContentModel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PosterStrategy {
    pub label: &'static str,
    pub engine: Engine,
    pub prompt: PromptKind,
}

pub const POSTER_STRATEGIES: [PosterStrategy; 3] = [
    PosterStrategy {
        label: "image model, detailed prompt",
        engine: Engine::ImageModel,
        prompt: PromptKind::Detailed,
    },
    PosterStrategy {
        label: "image model, minimal prompt",
        engine: Engine::ImageModel,
        prompt: PromptKind::Minimal,
    },
    PosterStrategy {
        label: "content model, minimal prompt",
        engine: Engine::ContentModel,
        prompt: PromptKind::Minimal,
    },
];

pub fn description_request(subject: &str) -> String {
    format!(
        "Based on real information from the web, write a detailed, visually descriptive \
         prompt for an AI image generator. The goal is a concert poster for the \
         artist/band: \"{subject}\". The prompt should include keywords about their \
         genre, visual style, typical stage presence and aesthetic. Make it specific \
         enough to produce an accurate, representative image of the artist. For example, \
         for 'Billie Eilish' a good prompt could be: \"A concert poster for Billie Eilish \
         with a dark, moody, slightly surreal aesthetic. Feature her signature baggy \
         clothes, neon green accents and an ethereal, dreamlike background.\""
    )
}

pub fn default_description(subject: &str) -> String {
    format!("A dynamic, visually striking concert poster for the artist/band: \"{subject}\"")
}

pub fn minimal_prompt(subject: &str) -> String {
    format!("A concert poster for: \"{subject}\"")
}

/// Returns the poster as a data URL, or `None` once every strategy failed.
pub async fn generate_poster(
    backend: &dyn GenerativeBackend,
    config: &AppConfig,
    subject: &str,
    aspect_ratio: AspectRatio,
) -> Option<String> {
    let detailed = describe(backend, config, subject).await;
    let minimal = minimal_prompt(subject);

    for strategy in POSTER_STRATEGIES {
        let prompt = match strategy.prompt {
            PromptKind::Detailed => detailed.as_str(),
            PromptKind::Minimal => minimal.as_str(),
        };
        tracing::info!("attempting poster generation ({})", strategy.label);
        match attempt(backend, config, strategy.engine, prompt, aspect_ratio).await {
            Ok(url) => {
                tracing::info!("poster generated ({})", strategy.label);
                return Some(url);
            }
            Err(err) => tracing::warn!("poster generation ({}) failed: {err}", strategy.label),
        }
    }

    tracing::error!("poster generation failed for every strategy");
    None
}

async fn describe(backend: &dyn GenerativeBackend, config: &AppConfig, subject: &str) -> String {
    let request = ContentRequest::new(&config.text_model)
        .text(description_request(subject))
        .grounding(Grounding::WebSearch);
    let text = match backend.generate_content(&request).await {
        Ok(response) => response.text.trim().to_string(),
        Err(err) => {
            tracing::warn!("poster description failed: {err}");
            String::new()
        }
    };
    if text.is_empty() {
        tracing::warn!("poster description came back empty, using the default description");
        return default_description(subject);
    }
    tracing::debug!("poster description: {text}");
    text
}

async fn attempt(
    backend: &dyn GenerativeBackend,
    config: &AppConfig,
    engine: Engine,
    prompt: &str,
    aspect_ratio: AspectRatio,
) -> Result<String, GatewayError> {
    let image = match engine {
        Engine::ImageModel => backend
            .generate_images(&ImageRequest {
                model: config.image_model.clone(),
                prompt: prompt.to_string(),
                aspect_ratio: aspect_ratio.to_string(),
            })
            .await?
            .into_iter()
            .next(),
        Engine::ContentModel => {
            let request = ContentRequest::new(&config.image_edit_model)
                .text(prompt)
                .image_output();
            backend.generate_content(&request).await?.images.into_iter().next()
        }
    };
    image
        .map(|image| image.to_data_url())
        .ok_or(GatewayError::Empty("image"))
}
