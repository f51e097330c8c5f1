//! Article selection: ask the model which listed article best matches the topic.
//!
//! The model is asked for a `{"title": ..., "url": ...}` object. Older or chattier models
//! sometimes answer with `Title:` / `URL:` lines instead, so that format is accepted as a
//! fallback.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::llm::{extract_json_from_text, LlmError, LlmProvider, LlmRequest};

/// Listing markup beyond this many characters is cut before prompting.
const MAX_LISTING_CHARS: usize = 60_000;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("failed to identify title or URL in model response: {0:?}")]
    Unparsable(String),
    #[error("model selected an invalid article URL '{0}'")]
    InvalidUrl(String),
    #[error(transparent)]
    Completion(#[from] LlmError),
}

/// Title and absolute URL of the chosen article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct SelectionJson {
    #[serde(alias = "Title")]
    title: Option<String>,
    #[serde(alias = "URL", alias = "link")]
    url: Option<String>,
}

/// Pick the most recent article relevant to `topic` from a listing page.
pub async fn select_article<P: LlmProvider + ?Sized>(
    provider: &P,
    listing: &str,
    listing_url: &str,
    topic: &str,
) -> Result<ArticleRef, SelectionError> {
    let listing: String = listing.chars().take(MAX_LISTING_CHARS).collect();
    let prompt = format!(
        r#"You are an assistant that finds the most relevant and most recent article on a news website.

Here is the content of the section page {listing_url}:

{listing}

Using the following topic, pick the single most recent and relevant article:

{topic}

Answer with a JSON object only, in exactly this shape:
{{"title": "<article title>", "url": "<absolute article URL>"}}
"#
    );

    let response = provider
        .generate(LlmRequest {
            prompt,
            max_tokens: Some(300),
            temperature: Some(0.2),
            json_output: true,
            ..Default::default()
        })
        .await?;

    debug!("selection: raw model answer {:?}", response.content);
    let (title, raw_url) = parse_selection(&response.content)?;
    let url = resolve_article_url(listing_url, &raw_url)?;
    info!("selection: picked '{}' ({})", title, url);

    Ok(ArticleRef { title, url })
}

/// Parse the model's answer into `(title, url)`.
pub fn parse_selection(text: &str) -> Result<(String, String), SelectionError> {
    if let Some(json) = extract_json_from_text(text) {
        if let Ok(parsed) = serde_json::from_str::<SelectionJson>(&json) {
            let title = parsed.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
            let url = parsed.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
            if let (Some(title), Some(url)) = (title, url) {
                return Ok((title, url));
            }
        }
    }

    parse_title_url_lines(text).ok_or_else(|| SelectionError::Unparsable(text.to_string()))
}

/// Fallback: scan for `Title:` and `URL:` lines in any order.
fn parse_title_url_lines(text: &str) -> Option<(String, String)> {
    let mut title = None;
    let mut url = None;

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['*', '-', ' ']);
        if let Some(rest) = line.strip_prefix("Title:") {
            title = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("URL:") {
            url = Some(rest.trim().trim_matches(['<', '>']).to_string());
        }
    }

    match (title, url) {
        (Some(t), Some(u)) if !t.is_empty() && !u.is_empty() => Some((t, u)),
        _ => None,
    }
}

/// Resolve a possibly relative article URL against the listing page.
pub fn resolve_article_url(listing_url: &str, raw: &str) -> Result<String, SelectionError> {
    let resolved = match Url::parse(listing_url) {
        Ok(base) => base.join(raw),
        Err(_) => Url::parse(raw),
    }
    .map_err(|_| SelectionError::InvalidUrl(raw.to_string()))?;

    if !matches!(resolved.scheme(), "http" | "https") {
        return Err(SelectionError::InvalidUrl(raw.to_string()));
    }
    Ok(resolved.to_string())
}
