//! Axum request handlers for the HTTP API.
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use std::sync::Arc;

use crate::api::routes::AppState;
use crate::error::{AppError, AppResult};
use crate::generation::request::{
    GenerateBody, ImageParams, ImageToImageRequest, ReferenceImage, TextToImageRequest,
};

pub async fn root() -> &'static str {
    "ArtForge server up"
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(body) = body.map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))?;
    let req = TextToImageRequest::try_from(body)?;
    let bytes = state.generator.generate_text_to_image(&req).await?;
    Ok(png(bytes))
}

pub async fn img2img(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut prompt = None;
    let mut image = None;
    let mut params = ImageParams::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let content_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidRequest(format!("Failed to read image: {}", e)))?;
                // browsers send an empty part when no file was chosen
                if !bytes.is_empty() {
                    image = Some(ReferenceImage { bytes, content_type });
                }
            }
            "prompt" => prompt = Some(read_text(field).await?),
            "width" => params.width = parse_number("width", &read_text(field).await?)?,
            "height" => params.height = parse_number("height", &read_text(field).await?)?,
            "steps" => params.steps = parse_number("steps", &read_text(field).await?)?,
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let req = ImageToImageRequest::from_parts(prompt, params, image)?;
    let bytes = state.generator.generate_image_to_image(&req).await?;
    Ok(png(bytes))
}

fn png(bytes: Bytes) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], bytes)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Malformed multipart field: {}", e)))
}

fn parse_number(name: &str, raw: &str) -> AppResult<u32> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::InvalidRequest(format!("Invalid {}: '{}'", name, raw)))
}
