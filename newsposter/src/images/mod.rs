//! Text-to-image providers.
//!
//! Every provider posts a prompt to its vendor API and writes the returned binary to the
//! requested path. Nothing is written unless the vendor answered with a success status.

use common::ImageProviderConfig;
use reqwest::Response;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod huggingface;
pub mod stability;
pub mod vyro;

pub use huggingface::HuggingFaceGenerator;
pub use stability::StabilityGenerator;
pub use vyro::VyroGenerator;

#[derive(Debug, Error)]
pub enum ImageGenerationError {
    #[error("{provider} image request failed with status {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} image request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned an empty image")]
    EmptyImage { provider: &'static str },
    #[error("failed to write image to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Provider name for logs and errors
    fn name(&self) -> &'static str;

    /// File extension of the images this provider returns
    fn extension(&self) -> &'static str;

    /// Generate an image for `prompt` and save it at `output`. Returns the written path.
    async fn generate(&self, prompt: &str, output: &Path) -> Result<PathBuf, ImageGenerationError>;
}

/// Create the generator named by `provider` (or `image.provider` when `None`).
pub fn create_image_generator(
    image_config: &common::ImageConfig,
    provider: Option<&str>,
) -> anyhow::Result<Arc<dyn ImageGenerator>> {
    let provider = provider
        .or(image_config.provider.as_deref())
        .unwrap_or("stability");
    let timeout = image_config.timeout_seconds.unwrap_or(180);
    let section = |cfg: &Option<ImageProviderConfig>| -> anyhow::Result<ImageProviderConfig> {
        cfg.clone()
            .ok_or_else(|| anyhow::anyhow!("image provider '{}' has no [image.{}] section", provider, provider))
    };

    match provider {
        "stability" => {
            let cfg = section(&image_config.stability)?;
            let key =
                common::secret_from_env(cfg.api_key_env.as_deref(), "image.stability.api_key_env")?;
            let url = cfg.api_url.unwrap_or_else(|| stability::STABILITY_ULTRA_URL.to_string());
            let generator = StabilityGenerator::new(url, key)
                .with_output_format(cfg.output_format.unwrap_or_else(|| "webp".to_string()))
                .with_timeout(timeout);
            Ok(Arc::new(generator))
        }
        "huggingface" => {
            let cfg = section(&image_config.huggingface)?;
            let key = common::secret_from_env(
                cfg.api_key_env.as_deref(),
                "image.huggingface.api_key_env",
            )?;
            let url = cfg.api_url.unwrap_or_else(|| huggingface::HUGGINGFACE_SDXL_URL.to_string());
            Ok(Arc::new(HuggingFaceGenerator::new(url, key).with_timeout(timeout)))
        }
        "vyro" => {
            let cfg = section(&image_config.vyro)?;
            let key =
                common::secret_from_env(cfg.api_key_env.as_deref(), "image.vyro.api_key_env")?;
            let url = cfg.api_url.unwrap_or_else(|| vyro::VYRO_GENERATIONS_URL.to_string());
            let generator = VyroGenerator::new(url, key)
                .with_style(
                    cfg.style.unwrap_or_else(|| "anime".to_string()),
                    cfg.aspect_ratio.unwrap_or_else(|| "1:1".to_string()),
                )
                .with_timeout(timeout);
            Ok(Arc::new(generator))
        }
        other => anyhow::bail!("Unknown image provider: {}", other),
    }
}

/// Turn a vendor response into bytes, or an error carrying the exact status and body.
async fn read_image_response(
    provider: &'static str,
    response: Response,
) -> Result<Vec<u8>, ImageGenerationError> {
    let status = response.status();
    if !status.is_success() {
        let body = error_body(response).await;
        return Err(ImageGenerationError::Status {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| ImageGenerationError::Http { provider, source })?;
    if bytes.is_empty() {
        return Err(ImageGenerationError::EmptyImage { provider });
    }
    Ok(bytes.to_vec())
}

/// Body text of a failed response; a body that cannot be read is reported as such.
async fn error_body(response: Response) -> String {
    match response.bytes().await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("<unreadable response body: {}>", e),
    }
}

/// Write the image, creating the parent directory when needed.
async fn save_image(
    provider: &'static str,
    output: &Path,
    bytes: &[u8],
) -> Result<PathBuf, ImageGenerationError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ImageGenerationError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(output, bytes)
        .await
        .map_err(|source| ImageGenerationError::Io {
            path: output.to_path_buf(),
            source,
        })?;

    info!("{}: saved {} bytes to {}", provider, bytes.len(), output.display());
    Ok(output.to_path_buf())
}
