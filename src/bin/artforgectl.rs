use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use artforge_proxy::compositor::{CompositorClient, GenerationConfig, RenderOptions};
use artforge_proxy::generation::{ImageParams, Mode, Provider};
use artforge_proxy::Config;

#[derive(Parser, Debug)]
#[command(name = "artforgectl", about = "CLI client for the ArtForge image proxy", version)]
struct Cli {
    /// Proxy base URL used for the hf provider
    #[arg(global = true, long, env = "ARTFORGE_SERVER_URL", default_value = "http://127.0.0.1:8787")]
    server_url: String,

    /// Directory for generated images and clips
    #[arg(global = true, long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an image from a prompt
    Generate {
        /// Prompt text
        prompt: String,
        /// hf (through the proxy) or pollinations (direct)
        #[arg(long, default_value = "hf")]
        provider: Provider,
        /// text2img or img2img
        #[arg(long, default_value = "text2img")]
        mode: Mode,
        /// Output size as WIDTHxHEIGHT
        #[arg(long, default_value = "768x768", value_parser = parse_size)]
        size: (u32, u32),
        /// Sampler steps
        #[arg(long, default_value_t = 20)]
        steps: u32,
        /// Reference image for img2img
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// Also render a pan/zoom clip of the result
        #[arg(long)]
        animate: bool,
    },
    /// Render a pan/zoom clip (animated GIF) from a still image
    Animate {
        /// Image path, file:// URL or http(s) URL
        #[arg(long)]
        source: String,
        /// Canvas size as WIDTHxHEIGHT
        #[arg(long, default_value = "768x768", value_parser = parse_size)]
        size: (u32, u32),
        /// Pace frames at 30 fps like a live capture
        #[arg(long)]
        realtime: bool,
    },
}

fn parse_size(raw: &str) -> Result<(u32, u32), String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Invalid size '{}', expected WIDTHxHEIGHT", raw))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("Invalid width in '{}'", raw))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("Invalid height in '{}'", raw))?;
    if w == 0 || h == 0 {
        return Err(format!("Size must be positive, got '{}'", raw));
    }
    Ok((w, h))
}

fn render_options(realtime: bool) -> RenderOptions {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::Relaxed);
        }
    });
    RenderOptions { realtime, cancel: Some(cancel) }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // Load env and parse CLI
    Config::dotenv_load();
    let cli = Cli::parse();
    let client = CompositorClient::new(&cli.server_url, &cli.out_dir);

    match cli.command {
        Commands::Generate { prompt, provider, mode, size, steps, image, animate } => {
            let config = GenerationConfig {
                provider,
                mode,
                prompt,
                params: ImageParams { width: size.0, height: size.1, steps },
                reference: image,
            };
            let asset = match client.request_generation(&config).await {
                Ok(asset) => asset,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            println!("{}", asset.url);

            if animate {
                let clip = client.render_pan_zoom_bytes(&asset.bytes, size.0, size.1, &render_options(false)).await?;
                println!("{}", clip.url);
            }
            Ok(())
        }
        Commands::Animate { source, size, realtime } => {
            let clip = client.render_pan_zoom(&source, size.0, size.1, &render_options(realtime)).await?;
            println!("Saved {} ({} bytes)", clip.url, clip.bytes.len());
            Ok(())
        }
    }
}
