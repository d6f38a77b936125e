//! Client for the keyless Pollinations image service.
//!
//! Images are addressed purely by URL:
//! `{base}/prompt/{encoded prompt}?width=W&height=H&seed=S`.
use bytes::Bytes;
use reqwest::Client;

use super::{error_from_response, BackendError};
use crate::generation::request::ImageParams;

#[derive(Clone)]
pub struct PollinationsClient {
    client: Client,
    base_url: String,
}

impl PollinationsClient {
    pub fn new(client: Client, base_url: String) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        PollinationsClient { client, base_url: base }
    }

    pub fn image_url(&self, prompt: &str, width: u32, height: u32, seed: u64) -> String {
        image_url(&self.base_url, prompt, width, height, seed)
    }

    /// Fetch an image using the deterministic per-prompt seed, so repeated
    /// prompts hit the same upstream image.
    pub async fn fetch(&self, prompt: &str, params: &ImageParams) -> Result<Bytes, BackendError> {
        let url = self.image_url(prompt, params.width, params.height, prompt_seed(prompt));
        self.fetch_url(&url).await
    }

    pub async fn fetch_url(&self, url: &str) -> Result<Bytes, BackendError> {
        tracing::info!("Fetching Pollinations image: {}", url);
        let response = self.client.get(url).send().await?;
        if response.status().is_success() {
            Ok(response.bytes().await?)
        } else {
            Err(error_from_response("Pollinations", response).await)
        }
    }
}

pub fn image_url(base_url: &str, prompt: &str, width: u32, height: u32, seed: u64) -> String {
    format!(
        "{}/prompt/{}?width={}&height={}&seed={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(prompt),
        width,
        height,
        seed
    )
}

/// Deterministic seed: the sum of the prompt's UTF-16 code units.
pub fn prompt_seed(prompt: &str) -> u64 {
    prompt.encode_utf16().map(u64::from).sum()
}

/// Time-varying seed used by clients that want a fresh image per request:
/// the absolute 32-bit string hash of the prompt with the timestamp appended.
pub fn time_seed(prompt: &str, now_millis: u128) -> u64 {
    let text = format!("{}{}", prompt, now_millis);
    string_hash(&text).unsigned_abs() as u64
}

fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn url_encodes_prompt() {
        let url = image_url("https://image.pollinations.ai/", "a red fox", 512, 256, 7);
        assert_eq!(url, "https://image.pollinations.ai/prompt/a%20red%20fox?width=512&height=256&seed=7");
    }

    #[test]
    fn prompt_seed_sums_code_units() {
        assert_eq!(prompt_seed("ab"), 97 + 98);
        assert_eq!(prompt_seed(""), 0);
    }

    #[test]
    fn string_hash_matches_java_style_hash() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("hello"), 99_162_322);
        // wraps instead of overflowing
        let _ = string_hash(&"z".repeat(1000));
    }

    #[test]
    fn time_seed_varies_with_time() {
        assert_ne!(time_seed("fox", 1_700_000_000_000), time_seed("fox", 1_700_000_000_001));
        assert_eq!(time_seed("fox", 42), time_seed("fox", 42));
    }

    #[tokio::test]
    async fn fetch_uses_prompt_seed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/prompt/ab")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("width".into(), "64".into()),
                Matcher::UrlEncoded("height".into(), "32".into()),
                Matcher::UrlEncoded("seed".into(), "195".into()),
            ]))
            .with_status(200)
            .with_body("img")
            .create_async()
            .await;

        let client = PollinationsClient::new(Client::new(), server.url());
        let params = ImageParams { width: 64, height: 32, steps: 20 };
        let bytes = client.fetch("ab", &params).await.unwrap();

        assert_eq!(&bytes[..], b"img");
        mock.assert_async().await;
    }
}
