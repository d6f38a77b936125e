//! Pan/zoom animation of a single still image.
//!
//! The geometry is a pure function of the frame index and canvas size, so the
//! same inputs always produce the same clip. Frames are handed to a
//! [`FrameSink`], which owns encoding.
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, DynamicImage, Frame, Rgba, RgbaImage};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};

pub const FPS: u32 = 30;
pub const DURATION_SECS: u32 = 3;
pub const FRAME_COUNT: u32 = FPS * DURATION_SECS;

const ZOOM: f64 = 0.08;
const PAN_X: f64 = 0.1;
const PAN_Y: f64 = 0.08;

/// Where and how large to draw the source image on one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameGeometry {
    pub dx: f64,
    pub dy: f64,
    pub width: f64,
    pub height: f64,
}

/// Geometry for frame `index` of `frames`: a slow zoom-in while panning right
/// and up.
pub fn frame_geometry(index: u32, frames: u32, width: u32, height: u32) -> FrameGeometry {
    let (w, h) = (f64::from(width), f64::from(height));
    let p = f64::from(index) / f64::from(frames.max(1));
    let scale = 1.0 + ZOOM * p;
    let draw_w = w * scale;
    let draw_h = h * scale;
    FrameGeometry {
        dx: -(draw_w - w) / 2.0 + (p - 0.5) * PAN_X * w,
        dy: -(draw_h - h) / 2.0 + (0.5 - p) * PAN_Y * h,
        width: draw_w,
        height: draw_h,
    }
}

pub fn pan_zoom_frames(width: u32, height: u32) -> Vec<FrameGeometry> {
    (0..FRAME_COUNT).map(|i| frame_geometry(i, FRAME_COUNT, width, height)).collect()
}

pub fn frame_interval() -> Duration {
    Duration::from_secs(1) / FPS
}

/// Clear a `width`×`height` canvas to opaque black and draw `source` on it.
pub fn draw_frame(source: &RgbaImage, width: u32, height: u32, geometry: &FrameGeometry) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    let scaled_w = (geometry.width.round() as u32).max(1);
    let scaled_h = (geometry.height.round() as u32).max(1);
    let scaled = imageops::resize(source, scaled_w, scaled_h, FilterType::Triangle);
    imageops::overlay(&mut canvas, &scaled, geometry.dx.round() as i64, geometry.dy.round() as i64);
    canvas
}

/// Receives drawn frames and assembles them into a clip.
pub trait FrameSink {
    type Output;

    fn submit(&mut self, frame: RgbaImage, delay: Duration) -> AppResult<()>;

    fn finish(self) -> AppResult<Self::Output>;
}

/// Encodes frames into a looping animated GIF as they arrive.
///
/// GIF delays are whole centiseconds, so each frame's delay is derived from the
/// running total of submitted time; the rounding error never accumulates and a
/// 30 fps stream of 90 frames lasts exactly 300 cs.
pub struct GifSink<W: Write> {
    encoder: GifEncoder<W>,
    elapsed: Duration,
    emitted_cs: u64,
}

impl<W: Write> GifSink<W> {
    /// `speed` trades quantization quality for time (1 = best, 30 = fastest).
    pub fn new(writer: W, speed: i32) -> AppResult<Self> {
        let mut encoder = GifEncoder::new_with_speed(writer, speed.clamp(1, 30));
        encoder.set_repeat(Repeat::Infinite)?;
        Ok(GifSink { encoder, elapsed: Duration::ZERO, emitted_cs: 0 })
    }

    fn next_delay_cs(&mut self, delay: Duration) -> u64 {
        self.elapsed += delay;
        let target_cs = (self.elapsed.as_micros() + 5_000) / 10_000;
        let frame_cs = target_cs as u64 - self.emitted_cs;
        self.emitted_cs += frame_cs;
        frame_cs
    }
}

impl<W: Write> FrameSink for GifSink<W> {
    type Output = ();

    fn submit(&mut self, frame: RgbaImage, delay: Duration) -> AppResult<()> {
        let cs = self.next_delay_cs(delay) as u32;
        let delay = Delay::from_numer_denom_ms(cs * 10, 1);
        self.encoder.encode_frame(Frame::from_parts(frame, 0, 0, delay))?;
        Ok(())
    }

    // dropping the encoder writes the GIF trailer
    fn finish(self) -> AppResult<()> {
        drop(self.encoder);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RenderOptions {
    /// Sleep one frame interval between submissions, like a live capture.
    pub realtime: bool,
    /// Checked before every frame; setting it aborts with `AppError::Cancelled`.
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Render the pan/zoom clip of `source` on a `width`×`height` canvas.
pub async fn render_pan_zoom<S: FrameSink>(
    source: &DynamicImage,
    width: u32,
    height: u32,
    mut sink: S,
    options: &RenderOptions,
) -> AppResult<S::Output> {
    if width == 0 || height == 0 {
        return Err(AppError::InvalidRequest("Canvas size must be positive".to_string()));
    }
    let source = source.to_rgba8();
    let interval = frame_interval();
    tracing::info!("Rendering {} frames at {}x{}", FRAME_COUNT, width, height);

    for (i, geometry) in pan_zoom_frames(width, height).iter().enumerate() {
        if options.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
            tracing::warn!("Render cancelled at frame {}", i);
            return Err(AppError::Cancelled);
        }
        sink.submit(draw_frame(&source, width, height, geometry), interval)?;
        if options.realtime {
            tokio::time::sleep(interval).await;
        }
    }

    sink.finish()
}
