use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{read_image_response, save_image, ImageGenerationError, ImageGenerator};

pub const STABILITY_ULTRA_URL: &str = "https://api.stability.ai/v2beta/stable-image/generate/ultra";

const PROVIDER: &str = "stability";

/// Stability AI "ultra" endpoint. Returns raw image bytes when asked for `image/*`.
pub struct StabilityGenerator {
    client: Client,
    api_url: String,
    api_key: String,
    output_format: String,
    timeout: Duration,
}

impl StabilityGenerator {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            output_format: "webp".to_string(),
            timeout: Duration::from_secs(180),
        }
    }

    /// `webp`, `png` or `jpeg`
    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }
}

#[async_trait::async_trait]
impl ImageGenerator for StabilityGenerator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn extension(&self) -> &'static str {
        match self.output_format.as_str() {
            "png" => "png",
            "jpeg" | "jpg" => "jpeg",
            _ => "webp",
        }
    }

    async fn generate(&self, prompt: &str, output: &Path) -> Result<PathBuf, ImageGenerationError> {
        // The endpoint rejects requests that are not multipart, hence the empty `none` part.
        let form = Form::new()
            .text("none", "")
            .text("prompt", prompt.to_string())
            .text("output_format", self.output_format.clone());

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "image/*")
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|source| ImageGenerationError::Http { provider: PROVIDER, source })?;

        let bytes = read_image_response(PROVIDER, response).await?;
        save_image(PROVIDER, output, &bytes).await
    }
}
