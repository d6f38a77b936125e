//! ArtForge image proxy library
//!
//! Modules:
//! - `api`: Axum HTTP handlers and router setup used by the proxy binary.
//! - `backends`: Thin clients for the keyed (Hugging Face) and keyless
//!   (Pollinations) image services.
//! - `cache`: Bounded in-memory LRU cache with TTL expiry.
//! - `generation`: Request validation, cache keys and the fallback policy.
//! - `compositor`: Client-side generation requests and pan/zoom animation.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `ImageCache`,
//! `ImageGenerator` and `CompositorClient`.
pub mod api;
pub mod backends;
pub mod cache;
pub mod compositor;
pub mod config;
pub mod error;
pub mod generation;

pub use cache::ImageCache;
pub use compositor::client::CompositorClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use generation::service::ImageGenerator;
