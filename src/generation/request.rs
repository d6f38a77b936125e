//! Generation request types, validation and cache keys.
use bytes::Bytes;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

pub const DEFAULT_SIZE: u32 = 768;
pub const DEFAULT_STEPS: u32 = 20;

/// Which backend a request should go to first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Provider {
    /// Credentialed inference API (Hugging Face).
    #[default]
    Keyed,
    /// Public keyless image service (Pollinations).
    Keyless,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Keyed => "hf",
            Provider::Keyless => "pollinations",
        }
    }

    /// Lenient wire parsing: anything that is not a keyless alias goes to the
    /// keyed backend, which is the proxy's default path anyway.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pollinations" | "keyless" => Provider::Keyless,
            _ => Provider::Keyed,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hf" | "keyed" | "huggingface" => Ok(Provider::Keyed),
            "pollinations" | "keyless" => Ok(Provider::Keyless),
            other => Err(format!("unknown provider '{}', expected hf or pollinations", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    TextToImage,
    ImageToImage,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text2img" | "txt2img" | "text-to-image" => Ok(Mode::TextToImage),
            "img2img" | "image-to-image" => Ok(Mode::ImageToImage),
            other => Err(format!("unknown mode '{}', expected text2img or img2img", other)),
        }
    }
}

/// Output dimensions and sampler steps shared by both modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ImageParams {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
}

impl Default for ImageParams {
    fn default() -> Self {
        ImageParams { width: DEFAULT_SIZE, height: DEFAULT_SIZE, steps: DEFAULT_STEPS }
    }
}

impl ImageParams {
    pub fn validate(&self) -> AppResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(AppError::InvalidRequest("Width and height must be positive".to_string()));
        }
        if self.steps == 0 {
            return Err(AppError::InvalidRequest("Steps must be positive".to_string()));
        }
        Ok(())
    }
}

/// JSON body accepted by `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub prompt: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub steps: Option<u32>,
    pub provider: Option<String>,
}

/// Browser forms post numbers as strings, so `512` and `"512"` are both accepted.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u32),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(raw)) if raw.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, got '{}'", raw))),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextToImageRequest {
    pub prompt: String,
    pub params: ImageParams,
    pub provider: Provider,
}

impl TextToImageRequest {
    pub fn cache_key(&self) -> String {
        format!(
            "g:{}:{}:{}:{}:{}",
            self.provider, self.prompt, self.params.width, self.params.height, self.params.steps
        )
    }
}

impl TryFrom<GenerateBody> for TextToImageRequest {
    type Error = AppError;

    fn try_from(body: GenerateBody) -> AppResult<Self> {
        let prompt = require_prompt(body.prompt)?;
        let defaults = ImageParams::default();
        let params = ImageParams {
            width: body.width.unwrap_or(defaults.width),
            height: body.height.unwrap_or(defaults.height),
            steps: body.steps.unwrap_or(defaults.steps),
        };
        params.validate()?;
        let provider = body.provider.as_deref().map(Provider::from_wire).unwrap_or_default();
        Ok(TextToImageRequest { prompt, params, provider })
    }
}

/// Uploaded reference image for image-to-image.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageToImageRequest {
    pub prompt: String,
    pub params: ImageParams,
    pub image: ReferenceImage,
}

impl ImageToImageRequest {
    /// Build from loosely-typed form fields, enforcing the same preconditions
    /// as the JSON endpoint plus the mandatory reference image.
    pub fn from_parts(
        prompt: Option<String>,
        params: ImageParams,
        image: Option<ReferenceImage>,
    ) -> AppResult<Self> {
        let prompt = require_prompt(prompt)?;
        let image = image.ok_or_else(|| AppError::InvalidRequest("Missing image file".to_string()))?;
        params.validate()?;
        Ok(ImageToImageRequest { prompt, params, image })
    }

    pub fn cache_key(&self) -> String {
        format!("i:{}:{}", self.prompt, self.image.bytes.len())
    }
}

// whitespace-only counts as missing; anything else is kept verbatim
fn require_prompt(prompt: Option<String>) -> AppResult<String> {
    match prompt {
        Some(p) if !p.trim().is_empty() => Ok(p),
        _ => Err(AppError::InvalidRequest("Missing prompt".to_string())),
    }
}
