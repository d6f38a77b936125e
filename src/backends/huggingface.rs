//! Client for the Hugging Face inference API.
//!
//! Both modes post to `{base}/models/{model}` with a bearer token and get raw
//! image bytes back.
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};

use super::{error_from_response, BackendError};
use crate::generation::request::{ImageParams, ReferenceImage};

#[derive(Clone)]
pub struct HuggingFaceClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(client: Client, base_url: String, model: String, api_key: Option<String>) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        HuggingFaceClient { client, base_url: base, model, api_key }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }

    fn inputs(prompt: &str, params: &ImageParams) -> Value {
        json!({
            "inputs": prompt,
            "parameters": {
                "width": params.width,
                "height": params.height,
                "steps": params.steps,
            }
        })
    }

    /// Generate an image from a text prompt.
    pub async fn text_to_image(&self, prompt: &str, params: &ImageParams) -> Result<Bytes, BackendError> {
        let key = self.api_key.as_deref().ok_or(BackendError::MissingCredential)?;
        let url = self.model_url();
        tracing::info!("Sending text-to-image request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&Self::inputs(prompt, params))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.bytes().await?)
        } else {
            Err(error_from_response("HF", response).await)
        }
    }

    /// Generate an image guided by a reference image. The request is sent as
    /// `multipart/form-data` with an `image` file part and an `inputs` JSON part.
    pub async fn image_to_image(
        &self,
        prompt: &str,
        params: &ImageParams,
        image: &ReferenceImage,
    ) -> Result<Bytes, BackendError> {
        let key = self.api_key.as_deref().ok_or(BackendError::MissingCredential)?;
        let url = self.model_url();
        tracing::info!("Sending img2img request to {} ({} byte reference)", url, image.bytes.len());

        let mime = image.content_type.as_deref().unwrap_or("application/octet-stream");
        let image_part = Part::bytes(image.bytes.to_vec()).file_name("img.png").mime_str(mime)?;
        let form = Form::new()
            .part("image", image_part)
            .text("inputs", Self::inputs(prompt, params).to_string());

        let response = self.client.post(&url).bearer_auth(key).multipart(form).send().await?;

        if response.status().is_success() {
            Ok(response.bytes().await?)
        } else {
            Err(error_from_response("HF", response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(base: String, key: Option<&str>) -> HuggingFaceClient {
        HuggingFaceClient::new(Client::new(), base, "test/model".into(), key.map(String::from))
    }

    #[tokio::test]
    async fn text_to_image_posts_inputs_with_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/test/model")
            .match_header("authorization", "Bearer hf_test")
            .match_body(Matcher::PartialJsonString(
                r#"{"inputs":"a red fox","parameters":{"width":512,"height":512,"steps":20}}"#.into(),
            ))
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body([0x89, b'P', b'N', b'G'])
            .create_async()
            .await;

        let hf = client(server.url(), Some("hf_test"));
        let params = ImageParams { width: 512, height: 512, steps: 20 };
        let bytes = hf.text_to_image("a red fox", &params).await.unwrap();

        assert_eq!(&bytes[..], &[0x89, b'P', b'N', b'G']);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_key_fails_without_a_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let hf = client(server.url(), None);
        let err = hf.text_to_image("x", &ImageParams::default()).await.unwrap_err();

        assert!(matches!(err, BackendError::MissingCredential));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/test/model")
            .with_status(503)
            .with_body("model loading")
            .create_async()
            .await;

        let hf = client(server.url(), Some("k"));
        let err = hf.text_to_image("x", &ImageParams::default()).await.unwrap_err();

        assert_eq!(err.detail(), "model loading");
        assert!(err.to_string().starts_with("HF 503"));
    }

    #[tokio::test]
    async fn image_to_image_sends_multipart() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/test/model")
            .match_header("content-type", Matcher::Regex("^multipart/form-data; boundary=".into()))
            .match_body(Matcher::Regex(r#"name="inputs""#.into()))
            .with_status(200)
            .with_body("out")
            .create_async()
            .await;

        let hf = client(server.url(), Some("k"));
        let image = ReferenceImage { bytes: Bytes::from_static(b"ref"), content_type: Some("image/png".into()) };
        let bytes = hf.image_to_image("castle", &ImageParams::default(), &image).await.unwrap();

        assert_eq!(&bytes[..], b"out");
        mock.assert_async().await;
    }
}
