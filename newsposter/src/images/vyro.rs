use reqwest::multipart::Form;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{read_image_response, save_image, ImageGenerationError, ImageGenerator};

pub const VYRO_GENERATIONS_URL: &str = "https://api.vyro.ai/v2/image/generations";

const PROVIDER: &str = "vyro";

/// Imagine (Vyro) text-to-image API, multipart form with style and aspect ratio.
pub struct VyroGenerator {
    client: Client,
    api_url: String,
    api_key: String,
    style: String,
    aspect_ratio: String,
    timeout: Duration,
}

impl VyroGenerator {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            style: "anime".to_string(),
            aspect_ratio: "1:1".to_string(),
            timeout: Duration::from_secs(180),
        }
    }

    pub fn with_style(mut self, style: impl Into<String>, aspect_ratio: impl Into<String>) -> Self {
        self.style = style.into();
        self.aspect_ratio = aspect_ratio.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }
}

#[async_trait::async_trait]
impl ImageGenerator for VyroGenerator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn extension(&self) -> &'static str {
        "png"
    }

    async fn generate(&self, prompt: &str, output: &Path) -> Result<PathBuf, ImageGenerationError> {
        let form = Form::new()
            .text("prompt", prompt.to_string())
            .text("style", self.style.clone())
            .text("aspect_ratio", self.aspect_ratio.clone());

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|source| ImageGenerationError::Http { provider: PROVIDER, source })?;

        let bytes = read_image_response(PROVIDER, response).await?;
        save_image(PROVIDER, output, &bytes).await
    }
}
