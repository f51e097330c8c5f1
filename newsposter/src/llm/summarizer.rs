// Post composition and image-prompt summarization
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use super::{LlmError, LlmProvider, LlmRequest};

/// Article text beyond this many characters is cut before prompting.
pub const MAX_ARTICLE_CHARS: usize = 30_000;

/// Turn the full article into a standalone LinkedIn post.
pub async fn compose_post<P: LlmProvider + ?Sized>(
    provider: &P,
    title: &str,
    article_text: &str,
    sanitize: bool,
) -> Result<String, LlmError> {
    let prompt = format!(
        r#"You have the full content of the article titled "{title}".
Write an engaging, informative LinkedIn post that makes readers want to dive into the topic.

RULES:
- Do not include any links or references to the article link.
- Do not use asterisks, bold, italics or any other special formatting, including for headings.
- Structure the post with short paragraphs and simple lists so it reads well in a feed.
- Make it a complete, standalone, professional post packed with concrete details.
- End with relevant hashtags.
- Output only the post text, nothing else.

ARTICLE CONTENT:
{content}
"#,
        title = title,
        content = truncate_chars(article_text, MAX_ARTICLE_CHARS),
    );

    let response = provider
        .generate(LlmRequest {
            prompt,
            temperature: Some(0.7),
            ..Default::default()
        })
        .await?;

    let post = response.content.trim().to_string();
    info!(
        "composer: generated post of {} chars ({} tokens)",
        post.chars().count(),
        response.usage.total_tokens
    );

    let post = if sanitize { sanitize_post(&post) } else { post };
    if post.is_empty() {
        return Err(LlmError::Empty);
    }
    Ok(post)
}

/// Condense the article into a short prompt for a text-to-image model.
pub async fn summarize_for_image<P: LlmProvider + ?Sized>(
    provider: &P,
    article_text: &str,
) -> Result<String, LlmError> {
    let prompt = format!(
        "Summarize the following article in two or three sentences, written as a visual \
         description suitable as a prompt for an AI text-to-image generator. \
         Output only the description.\n\n{}",
        truncate_chars(article_text, MAX_ARTICLE_CHARS)
    );

    let response = provider
        .generate(LlmRequest {
            prompt,
            max_tokens: Some(300),
            temperature: Some(0.5),
            ..Default::default()
        })
        .await?;

    let summary = response.content.trim().trim_matches('"').trim().to_string();
    if summary.is_empty() {
        return Err(LlmError::Empty);
    }
    info!("summarizer: image summary of {} chars", summary.chars().count());
    Ok(summary)
}

/// Prompt handed to the image generator for a given summary.
pub fn image_prompt(summary: &str) -> String {
    format!("An illustration related to {}.", summary.trim_end_matches('.'))
}

static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid link regex"));
static BARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("valid url regex"));
static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)#{1,6}[ \t]+").expect("valid heading regex"));
static STAR_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)[*+][ \t]+").expect("valid bullet regex"));
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*+|__").expect("valid emphasis regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid spaces regex"));

/// Strip markdown artifacts the model was told not to produce.
///
/// Headings lose their `#` markers but hashtags (`#ai`) are kept, star bullets become `•`,
/// links collapse to their label and bare URLs are dropped.
pub fn sanitize_post(text: &str) -> String {
    let text = MD_LINK.replace_all(text, "$1");
    let text = BARE_URL.replace_all(&text, "");
    let text = HEADING.replace_all(&text, "$1");
    let text = STAR_BULLET.replace_all(&text, "${1}• ");
    let text = EMPHASIS.replace_all(&text, "");

    text.lines()
        .map(|line| {
            let indent_len = line.len() - line.trim_start().len();
            let (indent, rest) = line.split_at(indent_len);
            format!("{}{}", indent, SPACES.replace_all(rest, " ").trim_end())
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, UsageMetadata};

    /// Provider that always answers with the same text
    struct FixedReply(&'static str);

    #[async_trait::async_trait]
    impl LlmProvider for FixedReply {
        async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse {
                content: self.0.to_string(),
                usage: UsageMetadata::default(),
                model: "fixed".to_string(),
            })
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn post_that_sanitizes_to_nothing_is_rejected() {
        let provider = FixedReply("https://example.com/story/123");
        let result = compose_post(&provider, "Title", "body", true).await;
        assert!(matches!(result, Err(LlmError::Empty)));

        // Without sanitation the reply is kept as is
        let post = compose_post(&provider, "Title", "body", false).await.unwrap();
        assert_eq!(post, "https://example.com/story/123");
    }

    #[tokio::test]
    async fn composed_post_is_sanitized() {
        let provider = FixedReply("**Big** step for #ai");
        let post = compose_post(&provider, "Title", "body", true).await.unwrap();
        assert_eq!(post, "Big step for #ai");
    }

    #[test]
    fn sanitize_strips_markdown_but_keeps_hashtags() {
        let raw = "## Big news\n**Bold** claim with [a link](http://x.io/a)\n* one\n* two\n\n#ai #ml";
        assert_eq!(
            sanitize_post(raw),
            "Big news\nBold claim with a link\n• one\n• two\n\n#ai #ml"
        );
    }

    #[test]
    fn sanitize_drops_bare_urls_and_double_underscores() {
        let raw = "Read __this__ now: https://example.com/story?id=1 today";
        assert_eq!(sanitize_post(raw), "Read this now: today");
    }

    #[test]
    fn sanitize_leaves_clean_text_alone() {
        let raw = "Post body #ai";
        assert_eq!(sanitize_post(raw), raw);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "héllo wörld";
        assert_eq!(truncate_chars(s, 4), "héll");
        assert_eq!(truncate_chars(s, 100), s);
    }

    #[test]
    fn image_prompt_wraps_summary() {
        assert_eq!(
            image_prompt("A robot reading the news."),
            "An illustration related to A robot reading the news."
        );
    }
}
