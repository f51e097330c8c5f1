use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{read_image_response, save_image, ImageGenerationError, ImageGenerator};

pub const HUGGINGFACE_SDXL_URL: &str =
    "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-xl-base-1.0";

const PROVIDER: &str = "huggingface";

/// Stable Diffusion XL through the Hugging Face inference API.
pub struct HuggingFaceGenerator {
    client: Client,
    api_url: String,
    api_token: String,
    timeout: Duration,
}

impl HuggingFaceGenerator {
    pub fn new(api_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_token: api_token.into(),
            timeout: Duration::from_secs(180),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    options: InferenceOptions,
}

#[derive(Serialize)]
struct InferenceOptions {
    /// Block until the model is loaded instead of failing with 503
    wait_for_model: bool,
}

#[async_trait::async_trait]
impl ImageGenerator for HuggingFaceGenerator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn extension(&self) -> &'static str {
        "png"
    }

    async fn generate(&self, prompt: &str, output: &Path) -> Result<PathBuf, ImageGenerationError> {
        let body = InferenceRequest {
            inputs: prompt,
            options: InferenceOptions { wait_for_model: true },
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|source| ImageGenerationError::Http { provider: PROVIDER, source })?;

        let bytes = read_image_response(PROVIDER, response).await?;
        save_image(PROVIDER, output, &bytes).await
    }
}
