use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Core trait for completion providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Model name used for logging
    fn model(&self) -> &str;
}

/// Request structure for LLM generation
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
    /// Ask the provider for a JSON-only answer when it supports it
    pub json_output: bool,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request timed out after {0}s")]
    Timeout(u64),
    #[error("LLM HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM response could not be parsed: {0}")]
    Malformed(String),
    #[error("LLM returned an empty completion")]
    Empty,
}

pub mod gemini;
pub mod remote;
pub mod summarizer;

/// Create the completion provider selected by `llm.adapter`.
pub fn create_llm_provider(llm_config: &common::LlmConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("gemini");
    match adapter {
        "gemini" => {
            let cfg = llm_config
                .gemini
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("llm.adapter = \"gemini\" but no [llm.gemini] section"))?;
            let api_key =
                common::secret_from_env(cfg.api_key_env.as_deref(), "llm.gemini.api_key_env")?;
            let model = cfg.model.clone().unwrap_or_else(|| "gemini-1.5-flash".to_string());
            let api_url = cfg.api_url.clone().unwrap_or_else(|| gemini::GEMINI_DEFAULT_URL.to_string());

            let provider = gemini::GeminiProvider::new(api_url, api_key, model).with_defaults(
                cfg.timeout_seconds.unwrap_or(60),
                cfg.max_tokens.unwrap_or(2048),
                0.7,
            );
            Ok(Arc::new(provider))
        }
        "remote" => {
            let cfg = llm_config
                .remote
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("llm.adapter = \"remote\" but no [llm.remote] section"))?;
            let api_key =
                common::secret_from_env(cfg.api_key_env.as_deref(), "llm.remote.api_key_env")?;
            let model = cfg.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            let api_url = cfg
                .api_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());

            let provider = remote::RemoteLlmProvider::new(api_url, api_key, model).with_defaults(
                cfg.timeout_seconds.unwrap_or(60),
                cfg.max_tokens.unwrap_or(1500),
                0.7,
            );
            Ok(Arc::new(provider))
        }
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}

/// Send `body` as JSON and decode the JSON answer; the whole exchange is bounded by `timeout`.
async fn post_json<B, R>(
    request: reqwest::RequestBuilder,
    body: &B,
    timeout: Duration,
) -> Result<R, LlmError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let exchange = async {
        let response = request.json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.bytes().await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => format!("<unreadable response body: {}>", e),
            };
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<R>()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| LlmError::Timeout(timeout.as_secs()))?
}

/// Helper to extract JSON from text that might contain markdown backticks or preamble
pub fn extract_json_from_text(text: &str) -> Option<String> {
    // 1. Try to find content between ```json and ```
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 2. Try to find content between ``` and ```
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 3. Try to find the first '{' and last '}'
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return Some(text[start..=end].to_string());
        }
    }

    None
}
