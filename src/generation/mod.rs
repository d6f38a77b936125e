pub mod request;
pub mod service;

pub use request::{ImageParams, ImageToImageRequest, Mode, Provider, ReferenceImage, TextToImageRequest};
pub use service::ImageGenerator;
