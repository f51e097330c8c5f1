use scraper::{Html, Selector};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::{info, warn};
use url::Url;

/// Anchors with shorter text are navigation noise, not headlines.
const MIN_HEADLINE_CHARS: usize = 25;
const MAX_LISTING_LINKS: usize = 150;

/// Reduce a section listing page to `headline | absolute-url` lines.
///
/// Relative hrefs are resolved against `base_url`; duplicates and non-http links are dropped.
/// Returns an empty string when nothing usable was found.
pub fn condense_listing(html: &str, base_url: &str) -> String {
    let base = Url::parse(base_url).ok();
    let document = Html::parse_document(html);
    let Ok(anchor) = Selector::parse("a[href]") else {
        return String::new();
    };

    let mut seen = HashSet::new();
    let mut lines = Vec::new();

    for element in document.select(&anchor) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() < MIN_HEADLINE_CHARS {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let resolved = match &base {
            Some(b) => b.join(href).ok(),
            None => Url::parse(href).ok(),
        };
        let Some(resolved) = resolved else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let url = resolved.to_string();
        if seen.insert(url.clone()) {
            lines.push(format!("{} | {}", text, url));
        }
        if lines.len() >= MAX_LISTING_LINKS {
            break;
        }
    }

    info!("scraping: condensed listing {} to {} links", base_url, lines.len());
    lines.join("\n")
}

/// Extract readable text from an article page.
/// Falls back to the raw markup when extraction yields nothing.
pub fn extract_article_text(html: &str, url: &str) -> String {
    let Ok(url_obj) = Url::parse(url) else {
        warn!("scraping: unparsable article URL {}, using raw markup", url);
        return html.to_string();
    };

    let mut reader = Cursor::new(html.as_bytes());
    match readability::extractor::extract(&mut reader, &url_obj) {
        Ok(product) => {
            // Convert HTML to plain text for cleaner LLM input
            let text = match html2text::from_read(product.content.as_bytes(), 100) {
                Ok(text) => text,
                Err(e) => {
                    warn!("scraping: failed to convert extracted HTML to text: {}", e);
                    product.text
                }
            };
            if text.trim().is_empty() {
                warn!("scraping: readability found no content in {}, using raw markup", url);
                html.to_string()
            } else {
                info!("scraping: extracted {} chars of text from {}", text.len(), url);
                text
            }
        }
        Err(e) => {
            warn!("scraping: readability failed for {}: {}", url, e);
            html.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <nav><a href="/">Home</a><a href="/section/technology/">Tech</a></nav>
          <div class="articles">
            <h2><a href="/article/technology/ai-model-beats-benchmark-123/">New AI model beats every benchmark this week</a></h2>
            <h2><a href="https://news.example.com/article/technology/chip-shortage-ends-456/">Global chip shortage finally comes to an end</a></h2>
            <h2><a href="/article/technology/ai-model-beats-benchmark-123/">New AI model beats every benchmark this week</a></h2>
            <a href="mailto:desk@example.com">Write to the technology desk about anything</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn listing_is_condensed_to_absolute_headline_links() {
        let condensed = condense_listing(LISTING, "https://news.example.com/section/technology/");
        let lines: Vec<&str> = condensed.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "New AI model beats every benchmark this week | https://news.example.com/article/technology/ai-model-beats-benchmark-123/"
        );
        assert!(lines[1].ends_with("/article/technology/chip-shortage-ends-456/"));
    }

    #[test]
    fn listing_without_headlines_is_empty() {
        let condensed = condense_listing("<p>nothing here</p>", "https://news.example.com/");
        assert!(condensed.is_empty());
    }

    #[test]
    fn bad_article_url_returns_raw_markup() {
        let html = "<p>raw</p>";
        assert_eq!(extract_article_text(html, "not a url"), html);
    }
}
