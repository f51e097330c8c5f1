use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{post_json, LlmError, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

pub const GEMINI_DEFAULT_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent";

/// Google generative-language provider (`generateContent` endpoint)
pub struct GeminiProvider {
    url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// `url_template` may contain a `{model}` placeholder.
    pub fn new(
        url_template: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        Self {
            url: url_template.into().replace("{model}", &model),
            api_key: api_key.into(),
            model,
            default_timeout: Duration::from_secs(60),
            default_max_tokens: 2048,
            default_temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(mut self, timeout_secs: u64, max_tokens: usize, temperature: f32) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: request.prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens.unwrap_or(self.default_max_tokens),
                temperature: request.temperature.unwrap_or(self.default_temperature),
                response_mime_type: request
                    .json_output
                    .then(|| "application/json".to_string()),
            },
        };

        let http = self.client.post(&self.url).header("x-goog-api-key", &self.api_key);
        let resp: GeminiResponse = post_json(http, &body, timeout).await?;

        if let Some(error) = resp.error {
            return Err(LlmError::Malformed(format!("Gemini API error: {}", error.message)));
        }

        // A candidate may be split across several parts
        let text: String = resp
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::Empty);
        }

        let usage = resp
            .usage_metadata
            .map(|u| UsageMetadata {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: text,
            usage,
            model: self.model.clone(),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct GeminiUsage {
    prompt_token_count: usize,
    candidates_token_count: usize,
    total_token_count: usize,
}
