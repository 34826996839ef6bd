use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::Error;

const QUERY_SLOT: &str = "{query}";

/// Art direction applied to a skybox query before it is sent for generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    FantasyLandscape,
    AnimeArtStyle,
    SurrealStyle,
    DigitalPainting,
    Scenic,
    Nebula,
    Realistic,
    SciFi,
    Dreamlike,
    Advanced,
}

impl PromptStyle {
    /// Style name for display
    pub fn name(&self) -> &str {
        match self {
            Self::FantasyLandscape => "Fantasy Landscape",
            Self::AnimeArtStyle => "Anime Art Style",
            Self::SurrealStyle => "Surreal Style",
            Self::DigitalPainting => "Digital Painting",
            Self::Scenic => "Scenic",
            Self::Nebula => "Nebula",
            Self::Realistic => "Realistic",
            Self::SciFi => "Sci-Fi",
            Self::Dreamlike => "Dreamlike",
            Self::Advanced => "Advanced",
        }
    }

    /// Stable identifier, accepted by `FromStr`
    pub fn id(&self) -> &str {
        match self {
            Self::FantasyLandscape => "fantasy_landscape",
            Self::AnimeArtStyle => "anime_art_style",
            Self::SurrealStyle => "surreal_style",
            Self::DigitalPainting => "digital_painting",
            Self::Scenic => "scenic",
            Self::Nebula => "nebula",
            Self::Realistic => "realistic",
            Self::SciFi => "sci_fi",
            Self::Dreamlike => "dreamlike",
            Self::Advanced => "advanced",
        }
    }

    /// Template with a single `{query}` slot
    pub fn template(&self) -> &'static str {
        match self {
            Self::FantasyLandscape => "detailed digital painting, c4d computer render, (fantasy VR360 dreamscape) {query}, cinematic lighting, detailed retro (VR360 fantasy concept art illustration), artstation",
            Self::AnimeArtStyle => "beautiful anime illustration(, VR360), view of a {query}, cinematic lighting, illustrated by studio ghibli(, VR360), pixiv, Miyazaki style, 8k anime style art(cel shading, VR360)",
            Self::SurrealStyle => "stunning beautiful surrealistic VR360 digital painting, (smooth 8k illustration, VR360), view of {query} , detailed fantasy matte painting, VR360, artstation, pixiv, game art, VR360",
            Self::DigitalPainting => "digital art, detailed digital VR360 painting, {query}, cinematic lighting, detailed illustration, artstation, VR360",
            Self::Scenic => "stunningly beautiful 8k VR360 digital painting, smooth fantasy {query}, volumetric lighting, pixiv, artstation, (smooth c4d VR360 render illustration), national geographic photography, (redshift render, photorealism, 8k, VR360)",
            Self::Nebula => "stunning beautiful 8k astronomical VR360 illustration, deep space, view of a {query} nebula, deep space, volumetric lighting, artstation, smooth VR360 render illustration, astro photography, (detailed photorealism, 8k, VR360)",
            Self::Realistic => "stunning professional 8k digital photo, (photorealism art, VR360), view of {query}, shot on 35mm film, volumetric lighting, equirectangular VR360 photograph, hyperrealism illustration, VR360",
            Self::SciFi => "stunning 8k digital scifi illustration, (photorealistic c4d VR360 render), view of {query} , unreal engine, volumetric lighting, detailed VR360 scifi art, futuristic equirectangular, VR360",
            Self::Dreamlike => "beautiful 8k VR360 digital painting, smooth geometric scifi, VR360 fractal art, view of a {query} four dimensional fractal, detailed futuristic VR360 fractal sculpture, volumetric lighting, highly detailed, artstation, pixiv, smooth cinema4d",
            Self::Advanced => "(VR360) {query} (VR360)",
        }
    }

    /// All available styles
    pub fn all() -> [PromptStyle; 10] {
        [
            Self::FantasyLandscape,
            Self::AnimeArtStyle,
            Self::SurrealStyle,
            Self::DigitalPainting,
            Self::Scenic,
            Self::Nebula,
            Self::Realistic,
            Self::SciFi,
            Self::Dreamlike,
            Self::Advanced,
        ]
    }
}

impl Default for PromptStyle {
    fn default() -> Self {
        Self::FantasyLandscape
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .into_iter()
            .find(|style| style.id() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unknown prompt style '{}'", s)))
    }
}

/// A user query paired with the style it should be rendered in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    query: String,
    style: PromptStyle,
}

impl PromptSpec {
    pub fn new(query: impl Into<String>, style: PromptStyle) -> Self {
        Self {
            query: query.into(),
            style,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn style(&self) -> PromptStyle {
        self.style
    }

    /// The prompt string sent to the generation service
    pub fn render(&self) -> String {
        self.style.template().replacen(QUERY_SLOT, &self.query, 1)
    }
}
