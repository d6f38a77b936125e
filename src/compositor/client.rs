//! Client side of the proxy: requests generations and renders animations.
//!
//! Results are materialized as [`LocalAsset`]s. Files written locally are the
//! caller's to release; nothing is cleaned up automatically.
use bytes::Bytes;
use image::ImageFormat;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::backends::pollinations::{image_url, time_seed};
use crate::compositor::animation::{render_pan_zoom, GifSink, RenderOptions};
use crate::config::DEFAULT_POLLINATIONS_BASE;
use crate::error::{AppError, AppResult};
use crate::generation::request::{ImageParams, Mode, Provider};

/// What the user asked for.
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub provider: Provider,
    pub mode: Mode,
    pub prompt: String,
    pub params: ImageParams,
    pub reference: Option<PathBuf>,
}

/// A displayable result: a URL plus the bytes behind it. `path` is set when the
/// bytes were written locally by this client.
#[derive(Clone, Debug)]
pub struct LocalAsset {
    pub url: String,
    pub path: Option<PathBuf>,
    pub bytes: Bytes,
}

impl LocalAsset {
    /// Remove the locally created file, if any.
    pub async fn release(self) -> AppResult<()> {
        if let Some(path) = self.path {
            tokio::fs::remove_file(&path).await?;
            tracing::debug!("Released {}", path.display());
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct CompositorClient {
    client: Client,
    server_url: String,
    keyless_base: String,
    out_dir: PathBuf,
}

impl CompositorClient {
    pub fn new(server_url: &str, out_dir: impl Into<PathBuf>) -> Self {
        CompositorClient {
            client: Client::new(),
            server_url: server_url.trim().trim_end_matches('/').to_string(),
            keyless_base: DEFAULT_POLLINATIONS_BASE.to_string(),
            out_dir: out_dir.into(),
        }
    }

    pub fn with_keyless_base(mut self, base: &str) -> Self {
        self.keyless_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Produce an image for `config`, either straight from the keyless service
    /// or through the proxy.
    pub async fn request_generation(&self, config: &GenerationConfig) -> AppResult<LocalAsset> {
        let prompt = config.prompt.as_str();
        if prompt.trim().is_empty() {
            return Err(AppError::InvalidRequest("Enter a prompt".to_string()));
        }
        config.params.validate()?;

        let provider = match (config.mode, config.provider) {
            (Mode::ImageToImage, Provider::Keyless) => {
                tracing::warn!("img2img is only supported by the keyed provider; switching to hf");
                Provider::Keyed
            }
            (_, provider) => provider,
        };

        match provider {
            Provider::Keyless => self.generate_keyless(prompt, &config.params).await,
            Provider::Keyed => self.generate_via_proxy(prompt, config).await,
        }
    }

    async fn generate_keyless(&self, prompt: &str, params: &ImageParams) -> AppResult<LocalAsset> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        let url = image_url(&self.keyless_base, prompt, params.width, params.height, time_seed(prompt, now));
        tracing::info!("Loading {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream { status, detail: format!("Image failed to load: {}", body) });
        }
        let bytes = response.bytes().await?;
        Ok(LocalAsset { url, path: None, bytes })
    }

    async fn generate_via_proxy(&self, prompt: &str, config: &GenerationConfig) -> AppResult<LocalAsset> {
        if self.server_url.is_empty() {
            return Err(AppError::InvalidRequest("Set Server URL to use Hugging Face".to_string()));
        }
        let params = &config.params;

        let request = match config.mode {
            Mode::TextToImage => self.client.post(format!("{}/api/generate", self.server_url)).json(&json!({
                "prompt": prompt,
                "width": params.width,
                "height": params.height,
                "steps": params.steps,
                "provider": Provider::Keyed.as_str(),
            })),
            Mode::ImageToImage => {
                let path = config
                    .reference
                    .as_deref()
                    .ok_or_else(|| AppError::InvalidRequest("Select reference image for img2img".to_string()))?;
                let form = Form::new()
                    .text("prompt", prompt.to_string())
                    .text("width", params.width.to_string())
                    .text("height", params.height.to_string())
                    .part("image", reference_part(path).await?)
                    .text("steps", params.steps.to_string());
                self.client.post(format!("{}/api/img2img", self.server_url)).multipart(form)
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream { status, detail });
        }
        let bytes = response.bytes().await?;
        self.write_local(bytes, "png").await
    }

    /// Render the pan/zoom clip of the image at `source` (URL or path) as an
    /// animated GIF written next to the other outputs.
    pub async fn render_pan_zoom(
        &self,
        source: &str,
        width: u32,
        height: u32,
        options: &RenderOptions,
    ) -> AppResult<LocalAsset> {
        let raw = self.load_source(source).await?;
        self.render_pan_zoom_bytes(&raw, width, height, options).await
    }

    /// Same as [`render_pan_zoom`](Self::render_pan_zoom) for image bytes
    /// already in hand, e.g. a [`LocalAsset`] returned by `request_generation`.
    pub async fn render_pan_zoom_bytes(
        &self,
        raw: &[u8],
        width: u32,
        height: u32,
        options: &RenderOptions,
    ) -> AppResult<LocalAsset> {
        let image = image::load_from_memory(raw)?;
        let mut gif = Vec::new();
        render_pan_zoom(&image, width, height, GifSink::new(&mut gif, 10)?, options).await?;
        self.write_local(Bytes::from(gif), "gif").await
    }

    async fn load_source(&self, source: &str) -> AppResult<Bytes> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self.client.get(source).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(AppError::Upstream { status, detail: format!("Failed to load {}", source) });
            }
            return Ok(response.bytes().await?);
        }
        let path = source.strip_prefix("file://").unwrap_or(source);
        Ok(Bytes::from(tokio::fs::read(path).await?))
    }

    async fn write_local(&self, bytes: Bytes, extension: &str) -> AppResult<LocalAsset> {
        tokio::fs::create_dir_all(&self.out_dir).await?;
        let path = self.out_dir.join(format!("artforge-{}.{}", Uuid::new_v4(), extension));
        tokio::fs::write(&path, &bytes).await?;
        let path = tokio::fs::canonicalize(&path).await?;
        Ok(LocalAsset { url: format!("file://{}", path.display()), path: Some(path), bytes })
    }
}

async fn reference_part(path: &Path) -> AppResult<Part> {
    let data = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.png".to_string());
    Ok(Part::bytes(data).file_name(file_name).mime_str(guess_mime(path))?)
}

fn guess_mime(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}
