//! Client compositor: request images and animate them.
pub mod animation;
pub mod client;

pub use animation::{pan_zoom_frames, render_pan_zoom, FrameGeometry, FrameSink, GifSink, RenderOptions};
pub use client::{CompositorClient, GenerationConfig, LocalAsset};
