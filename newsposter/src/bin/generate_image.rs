//! Generate a single image with one of the configured providers.
//!
//!   cargo run --bin generate_image -- --provider vyro --prompt "a lighthouse at dusk"

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use tracing::info;

use newsposter::images::create_image_generator;

#[derive(Parser, Debug)]
#[command(name = "generate_image", about = "Generate one image from a text prompt")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// stability, huggingface or vyro (defaults to image.provider)
    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    prompt: String,

    /// Vyro style
    #[arg(long)]
    style: Option<String>,

    /// Vyro aspect ratio, e.g. 1:1 or 16:9
    #[arg(long)]
    aspect_ratio: Option<String>,

    /// Output file (extension is added when missing)
    #[arg(long, default_value = "image")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let default_path = PathBuf::from("config.default.toml");
    let override_path = args
        .config
        .clone()
        .or_else(|| Some(PathBuf::from("config.toml")).filter(|p| p.exists()));
    let config = Config::load_with_defaults(
        Some(default_path.as_path()).filter(|p| p.exists()),
        override_path.as_deref(),
    )
    .await
    .context("failed to load configuration")?;

    let mut image_config = config.image.clone();
    if let Some(vyro) = image_config.vyro.as_mut() {
        if args.style.is_some() {
            vyro.style = args.style.clone();
        }
        if args.aspect_ratio.is_some() {
            vyro.aspect_ratio = args.aspect_ratio.clone();
        }
    }

    let generator = create_image_generator(&image_config, args.provider.as_deref())?;
    let output = if args.output.extension().is_some() {
        args.output.clone()
    } else {
        args.output.with_extension(generator.extension())
    };

    info!(provider = generator.name(), output = %output.display(), "generating image");
    let path = generator.generate(&args.prompt, &output).await?;
    println!("{}", path.display());
    Ok(())
}
