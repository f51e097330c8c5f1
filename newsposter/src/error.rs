use thiserror::Error;

use crate::fetcher::FetchError;
use crate::images::ImageGenerationError;
use crate::linkedin::SocialError;
use crate::llm::LlmError;
use crate::selection::SelectionError;

/// Failure of one pipeline run, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("listing fetch failed: {0}")]
    ListingFetch(#[source] FetchError),
    #[error("article selection failed: {0}")]
    Selection(#[from] SelectionError),
    #[error("article fetch failed: {0}")]
    ArticleFetch(#[source] FetchError),
    #[error("post composition failed: {0}")]
    Compose(#[source] LlmError),
    #[error("summarization failed: {0}")]
    Summarize(#[source] LlmError),
    #[error("image generation failed: {0}")]
    ImageGeneration(#[from] ImageGenerationError),
    #[error("publishing failed: {0}")]
    Publish(#[from] SocialError),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::ListingFetch(_) => "fetch_listing",
            PipelineError::Selection(_) => "select_article",
            PipelineError::ArticleFetch(_) => "fetch_article",
            PipelineError::Compose(_) => "compose_post",
            PipelineError::Summarize(_) => "summarize",
            PipelineError::ImageGeneration(_) => "generate_image",
            PipelineError::Publish(SocialError::Registration { .. }) => "register_asset",
            PipelineError::Publish(SocialError::Upload { .. }) => "upload_image",
            PipelineError::Publish(SocialError::Publish { .. }) => "create_post",
            PipelineError::Publish(_) => "publish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_follow_the_failing_step() {
        let err = PipelineError::ListingFetch(FetchError::Status {
            url: "http://a/".to_string(),
            status: 404,
        });
        assert_eq!(err.stage(), "fetch_listing");
        assert!(err.to_string().contains("404"));

        let err = PipelineError::from(SocialError::Upload {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(err.stage(), "upload_image");

        let err = PipelineError::from(SelectionError::Unparsable("??".to_string()));
        assert_eq!(err.stage(), "select_article");
    }
}
