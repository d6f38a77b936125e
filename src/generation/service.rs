//! Cache-first routing between the keyed and keyless backends.
//!
//! Text-to-image tries the keyed backend and falls back to the keyless one;
//! image-to-image is keyed-only. Every success is cached under the key of the
//! original request, whichever backend produced the bytes.
use bytes::Bytes;
use std::sync::Arc;

use crate::backends::{BackendError, HuggingFaceClient, PollinationsClient};
use crate::cache::ImageCache;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::generation::request::{ImageToImageRequest, Provider, TextToImageRequest};

#[derive(Clone)]
pub struct ImageGenerator {
    cache: Arc<ImageCache>,
    hf: HuggingFaceClient,
    pollinations: PollinationsClient,
}

impl ImageGenerator {
    pub fn new(cache: Arc<ImageCache>, hf: HuggingFaceClient, pollinations: PollinationsClient) -> Self {
        ImageGenerator { cache, hf, pollinations }
    }

    /// Wire up clients and a fresh cache from configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let client = crate::backends::http_client(config.upstream_timeout)?;
        let hf = HuggingFaceClient::new(
            client.clone(),
            config.hf_api_base.clone(),
            config.hf_model.clone(),
            config.hf_api_key.clone(),
        );
        let pollinations = PollinationsClient::new(client, config.pollinations_base.clone());
        let cache = Arc::new(ImageCache::new(config.cache_max_entries, config.cache_ttl));
        Ok(ImageGenerator::new(cache, hf, pollinations))
    }

    /// Whether keyed calls can succeed at all; without a credential they fail
    /// fast and text-to-image goes straight to the fallback.
    pub fn has_keyed_credential(&self) -> bool {
        self.hf.has_credential()
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub async fn generate_text_to_image(&self, req: &TextToImageRequest) -> AppResult<Bytes> {
        let key = req.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(hit);
        }
        tracing::debug!(key = %key, "Cache miss");

        let bytes = match req.provider {
            Provider::Keyless => self
                .pollinations
                .fetch(&req.prompt, &req.params)
                .await
                .map_err(|e| {
                    tracing::error!("Pollinations error: {}", e);
                    AppError::bad_gateway("Pollinations fetch failed")
                })?,
            Provider::Keyed => match self.hf.text_to_image(&req.prompt, &req.params).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("HF error: {}; falling back to Pollinations", e);
                    self.pollinations.fetch(&req.prompt, &req.params).await.map_err(|fallback| {
                        tracing::error!("Pollinations fallback error: {}", fallback);
                        AppError::bad_gateway("HF failed and Pollinations fallback failed")
                    })?
                }
            },
        };

        self.cache.set(key, bytes.clone());
        Ok(bytes)
    }

    pub async fn generate_image_to_image(&self, req: &ImageToImageRequest) -> AppResult<Bytes> {
        let key = req.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(hit);
        }
        tracing::debug!(key = %key, "Cache miss");

        let bytes = self
            .hf
            .image_to_image(&req.prompt, &req.params, &req.image)
            .await
            .map_err(|e| match e {
                BackendError::MissingCredential => AppError::upstream("Missing HUGGINGFACE_API_KEY"),
                other => {
                    tracing::error!("HF img2img error: {}", other);
                    AppError::upstream(format!("HF img2img failed: {}", other.detail()))
                }
            })?;

        self.cache.set(key, bytes.clone());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::request::{ImageParams, ReferenceImage};
    use axum::http::StatusCode;
    use mockito::{Matcher, Server};
    use reqwest::Client;

    fn generator(hf_url: &str, poll_url: &str, key: Option<&str>) -> ImageGenerator {
        let client = Client::new();
        ImageGenerator::new(
            Arc::new(ImageCache::default()),
            HuggingFaceClient::new(client.clone(), hf_url.to_string(), "m".into(), key.map(String::from)),
            PollinationsClient::new(client, poll_url.to_string()),
        )
    }

    fn text(prompt: &str, provider: Provider) -> TextToImageRequest {
        TextToImageRequest {
            prompt: prompt.into(),
            params: ImageParams { width: 512, height: 512, steps: 20 },
            provider,
        }
    }

    #[test]
    fn reports_whether_keyed_credential_is_configured() {
        assert!(generator("http://127.0.0.1:9", "http://127.0.0.1:9", Some("k")).has_keyed_credential());
        assert!(!generator("http://127.0.0.1:9", "http://127.0.0.1:9", None).has_keyed_credential());
    }

    #[tokio::test]
    async fn second_identical_request_is_served_from_cache() {
        let mut hf = Server::new_async().await;
        let poll = Server::new_async().await;
        let mock = hf.mock("POST", "/models/m").with_status(200).with_body("hf-img").expect(1).create_async().await;

        let gen = generator(&hf.url(), &poll.url(), Some("k"));
        let req = text("a red fox", Provider::Keyed);
        let first = gen.generate_text_to_image(&req).await.unwrap();
        let second = gen.generate_text_to_image(&req).await.unwrap();

        assert_eq!(first, second);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn keyed_failure_falls_back_and_caches_under_original_key() {
        let mut hf = Server::new_async().await;
        let mut poll = Server::new_async().await;
        hf.mock("POST", "/models/m").with_status(500).with_body("boom").create_async().await;
        let fallback = poll
            .mock("GET", Matcher::Regex("^/prompt/".into()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("poll-img")
            .create_async()
            .await;

        let gen = generator(&hf.url(), &poll.url(), Some("k"));
        let req = text("a red fox", Provider::Keyed);
        let bytes = gen.generate_text_to_image(&req).await.unwrap();

        assert_eq!(&bytes[..], b"poll-img");
        assert_eq!(gen.cache().get("g:hf:a red fox:512:512:20"), Some(bytes));
        fallback.assert_async().await;
    }

    #[tokio::test]
    async fn both_backends_failing_is_bad_gateway() {
        let mut poll = Server::new_async().await;
        poll.mock("GET", Matcher::Any).match_query(Matcher::Any).with_status(500).create_async().await;

        let gen = generator("http://127.0.0.1:9", &poll.url(), None);
        let err = gen.generate_text_to_image(&text("x", Provider::Keyed)).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "HF failed and Pollinations fallback failed");
        assert!(gen.cache().is_empty());
    }

    #[tokio::test]
    async fn keyless_failure_does_not_try_keyed() {
        let mut hf = Server::new_async().await;
        let mut poll = Server::new_async().await;
        let keyed = hf.mock("POST", Matcher::Any).expect(0).create_async().await;
        poll.mock("GET", Matcher::Any).match_query(Matcher::Any).with_status(404).create_async().await;

        let gen = generator(&hf.url(), &poll.url(), Some("k"));
        let err = gen.generate_text_to_image(&text("x", Provider::Keyless)).await.unwrap_err();

        assert_eq!(err.to_string(), "Pollinations fetch failed");
        keyed.assert_async().await;
    }

    #[tokio::test]
    async fn img2img_without_key_fails_with_no_fallback() {
        let mut poll = Server::new_async().await;
        let keyless = poll.mock("GET", Matcher::Any).match_query(Matcher::Any).expect(0).create_async().await;

        let gen = generator("http://127.0.0.1:9", &poll.url(), None);
        let req = ImageToImageRequest {
            prompt: "castle".into(),
            params: ImageParams::default(),
            image: ReferenceImage { bytes: Bytes::from_static(b"ref"), content_type: None },
        };
        let err = gen.generate_image_to_image(&req).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Missing HUGGINGFACE_API_KEY");
        keyless.assert_async().await;
    }

    #[tokio::test]
    async fn img2img_upstream_error_carries_body() {
        let mut hf = Server::new_async().await;
        hf.mock("POST", "/models/m").with_status(400).with_body("bad image").create_async().await;

        let gen = generator(&hf.url(), "http://127.0.0.1:9", Some("k"));
        let req = ImageToImageRequest {
            prompt: "castle".into(),
            params: ImageParams::default(),
            image: ReferenceImage { bytes: Bytes::from_static(b"ref"), content_type: None },
        };
        let err = gen.generate_image_to_image(&req).await.unwrap_err();

        assert_eq!(err.to_string(), "HF img2img failed: bad image");
    }
}
