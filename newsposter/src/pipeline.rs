use anyhow::Context;
use common::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::fetcher::ContentFetcher;
use crate::images::{create_image_generator, ImageGenerator};
use crate::linkedin::{LinkedInPublisher, PublishReceipt, LINKEDIN_API_BASE};
use crate::llm::summarizer::{compose_post, image_prompt, summarize_for_image};
use crate::llm::{create_llm_provider, LlmProvider};
use crate::scraping;
use crate::selection::select_article;

/// One invocation, scheduled or on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub category: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    #[serde(skip)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub article: Article,
    pub post: String,
    pub summary: String,
    pub image_path: PathBuf,
    pub receipt: PublishReceipt,
}

/// Knobs that are not tied to a specific external service
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub section_url_template: String,
    pub condense_listing: bool,
    pub sanitize_post: bool,
    pub output_dir: PathBuf,
}

impl PipelineSettings {
    pub fn section_url(&self, category: &str) -> String {
        common::section_url(&self.section_url_template, category)
    }
}

pub struct Pipeline {
    llm: Arc<dyn LlmProvider>,
    fetcher: ContentFetcher,
    images: Arc<dyn ImageGenerator>,
    publisher: LinkedInPublisher,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        fetcher: ContentFetcher,
        images: Arc<dyn ImageGenerator>,
        publisher: LinkedInPublisher,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            llm,
            fetcher,
            images,
            publisher,
            settings,
        }
    }

    /// Build every client from configuration; secrets come from the environment.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let llm = create_llm_provider(&config.llm)?;
        let images = create_image_generator(&config.image, None)?;

        let scraping = &config.scraping;
        let fetcher = ContentFetcher::new(
            scraping.timeout_seconds.unwrap_or(20),
            scraping.max_retries.unwrap_or(3),
            scraping.user_agent.as_deref().unwrap_or("newsposter/0.1.0"),
        )
        .context("failed to build content fetcher")?;

        let li = &config.linkedin;
        let access_token =
            common::secret_from_env(li.access_token_env.as_deref(), "linkedin.access_token_env")?;
        let profile_id =
            common::secret_from_env(li.profile_id_env.as_deref(), "linkedin.profile_id_env")?;
        let publisher = LinkedInPublisher::new(
            li.api_base.clone().unwrap_or_else(|| LINKEDIN_API_BASE.to_string()),
            access_token,
            profile_id,
            li.timeout_seconds.unwrap_or(60),
        )
        .context("failed to build LinkedIn publisher")?;

        let settings = PipelineSettings {
            section_url_template: scraping.section_url_template.clone(),
            condense_listing: scraping.condense_listing.unwrap_or(true),
            sanitize_post: config.pipeline.sanitize_post.unwrap_or(true),
            output_dir: PathBuf::from(config.image.output_dir.as_deref().unwrap_or("generated")),
        };

        info!(
            "pipeline: llm model {}, image provider {}",
            llm.model(),
            images.name()
        );
        Ok(Self::new(llm, fetcher, images, publisher, settings))
    }

    /// Per-run image path; runs never share a file.
    pub fn image_path_for(&self, run_id: Uuid) -> PathBuf {
        self.settings
            .output_dir
            .join(format!("{}.{}", run_id, self.images.extension()))
    }

    /// fetch listing → select → fetch article → compose → summarize → image → publish
    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, category = %request.category, "pipeline: run started");

        let listing_url = self.settings.section_url(&request.category);
        let listing_html = self
            .fetcher
            .fetch(&listing_url)
            .await
            .map_err(PipelineError::ListingFetch)?;

        let listing = if self.settings.condense_listing {
            let condensed = scraping::condense_listing(&listing_html, &listing_url);
            if condensed.is_empty() {
                listing_html
            } else {
                condensed
            }
        } else {
            listing_html
        };

        let selected = select_article(self.llm.as_ref(), &listing, &listing_url, &request.prompt).await?;
        info!(%run_id, title = %selected.title, url = %selected.url, "pipeline: article selected");

        let article_html = self
            .fetcher
            .fetch(&selected.url)
            .await
            .map_err(PipelineError::ArticleFetch)?;
        let article = Article {
            content: scraping::extract_article_text(&article_html, &selected.url),
            title: selected.title,
            url: selected.url,
        };

        let post = compose_post(
            self.llm.as_ref(),
            &article.title,
            &article.content,
            self.settings.sanitize_post,
        )
        .await
        .map_err(PipelineError::Compose)?;

        let summary = summarize_for_image(self.llm.as_ref(), &article.content)
            .await
            .map_err(PipelineError::Summarize)?;

        let image_path = self
            .images
            .generate(&image_prompt(&summary), &self.image_path_for(run_id))
            .await?;
        info!(%run_id, path = %image_path.display(), "pipeline: image generated");

        let receipt = self.publish(&post, Some(&image_path)).await?;
        info!(%run_id, "pipeline: run finished");

        Ok(PipelineOutcome {
            run_id,
            article,
            post,
            summary,
            image_path,
            receipt,
        })
    }

    /// Publish already-generated content.
    pub async fn publish(&self, text: &str, image: Option<&Path>) -> Result<PublishReceipt, PipelineError> {
        Ok(self.publisher.publish(text, image).await?)
    }
}
