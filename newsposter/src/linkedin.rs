//! LinkedIn publishing
//!
//! Posts go through the UGC API. An image post is three sequential calls:
//! register an upload (returns an asset URN and a pre-signed upload URL), upload the
//! binary to that URL, then create the post referencing the asset. No call is retried.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const LINKEDIN_API_BASE: &str = "https://api.linkedin.com/v2";

const RESTLI_HEADER: &str = "X-Restli-Protocol-Version";
const RESTLI_VERSION: &str = "2.0.0";
const FEEDSHARE_IMAGE_RECIPE: &str = "urn:li:digitalmediaRecipe:feedshare-image";
const UPLOAD_MECHANISM: &str = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest";

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("LinkedIn asset registration failed with status {status}: {body}")]
    Registration { status: u16, body: String },
    #[error("LinkedIn image upload failed with status {status}: {body}")]
    Upload { status: u16, body: String },
    #[error("LinkedIn post creation failed with status {status}: {body}")]
    Publish { status: u16, body: String },
    #[error("unexpected LinkedIn response: {0}")]
    MalformedResponse(String),
    #[error("LinkedIn request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a successful publish
#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    /// URN of the created post, from the `x-restli-id` header or the body `id`
    pub post_id: Option<String>,
    /// Asset URN of the uploaded image, if any
    pub asset: Option<String>,
}

/// Registered upload slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub asset: String,
    pub upload_url: String,
}

pub struct LinkedInPublisher {
    client: Client,
    api_base: String,
    access_token: String,
    profile_id: String,
}

impl LinkedInPublisher {
    pub fn new(
        api_base: impl Into<String>,
        access_token: impl Into<String>,
        profile_id: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, SocialError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            profile_id: profile_id.into(),
        })
    }

    pub fn author_urn(&self) -> String {
        format!("urn:li:person:{}", self.profile_id)
    }

    /// Publish `text`, with `image` attached when given.
    pub async fn publish(&self, text: &str, image: Option<&Path>) -> Result<PublishReceipt, SocialError> {
        let asset = match image {
            Some(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|source| SocialError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let media = self.register_upload().await?;
                self.upload_image(&media, bytes).await?;
                Some(media.asset)
            }
            None => None,
        };

        let payload = build_post_payload(&self.author_urn(), text, asset.as_deref());
        let post_id = self.create_post(&payload).await?;
        info!("linkedin: post created ({})", post_id.as_deref().unwrap_or("unknown id"));

        Ok(PublishReceipt { post_id, asset })
    }

    /// Step 1: register an image upload for the profile.
    pub async fn register_upload(&self) -> Result<MediaAsset, SocialError> {
        let body = RegisterUploadEnvelope {
            register_upload_request: RegisterUploadRequest {
                recipes: vec![FEEDSHARE_IMAGE_RECIPE.to_string()],
                owner: self.author_urn(),
                service_relationships: vec![ServiceRelationship {
                    relationship_type: "OWNER".to_string(),
                    identifier: "urn:li:userGeneratedContent".to_string(),
                }],
            },
        };

        let response = self
            .client
            .post(format!("{}/assets?action=registerUpload", self.api_base))
            .bearer_auth(&self.access_token)
            .header(RESTLI_HEADER, RESTLI_VERSION)
            .json(&body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = error_body(response).await;
            return Err(SocialError::Registration { status, body });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SocialError::MalformedResponse(e.to_string()))?;
        let media = parse_register_response(&value)?;
        info!("linkedin: registered asset {}", media.asset);
        Ok(media)
    }

    /// Step 2: upload the binary to the pre-signed URL.
    pub async fn upload_image(&self, media: &MediaAsset, bytes: Vec<u8>) -> Result<(), SocialError> {
        let size = bytes.len();
        let response = self
            .client
            .post(&media.upload_url)
            .bearer_auth(&self.access_token)
            .header(RESTLI_HEADER, RESTLI_VERSION)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = error_body(response).await;
            return Err(SocialError::Upload {
                status: status.as_u16(),
                body,
            });
        }
        info!("linkedin: uploaded {} bytes for {}", size, media.asset);
        Ok(())
    }

    /// Step 3: create the post.
    async fn create_post(&self, payload: &UgcPost) -> Result<Option<String>, SocialError> {
        let response = self
            .client
            .post(format!("{}/ugcPosts", self.api_base))
            .bearer_auth(&self.access_token)
            .header(RESTLI_HEADER, RESTLI_VERSION)
            .json(payload)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            let status = response.status().as_u16();
            let body = error_body(response).await;
            return Err(SocialError::Publish { status, body });
        }

        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if header_id.is_some() {
            return Ok(header_id);
        }

        let body_id = response
            .json::<PostCreated>()
            .await
            .ok()
            .and_then(|p| p.id);
        Ok(body_id)
    }
}

/// Body text of a rejected call; a body that cannot be read is reported as such.
async fn error_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("<unreadable response body: {}>", e),
    }
}

fn parse_register_response(value: &serde_json::Value) -> Result<MediaAsset, SocialError> {
    let inner = &value["value"];
    let upload_url = inner["uploadMechanism"][UPLOAD_MECHANISM]["uploadUrl"]
        .as_str()
        .ok_or_else(|| SocialError::MalformedResponse("registration response has no uploadUrl".to_string()))?;
    let asset = inner["asset"]
        .as_str()
        .ok_or_else(|| SocialError::MalformedResponse("registration response has no asset".to_string()))?;

    Ok(MediaAsset {
        asset: asset.to_string(),
        upload_url: upload_url.to_string(),
    })
}

/// Build the UGC post body. With an asset the post is an IMAGE share, otherwise NONE.
pub fn build_post_payload(author_urn: &str, text: &str, asset: Option<&str>) -> UgcPost {
    let (category, media) = match asset {
        Some(asset) => (
            "IMAGE",
            vec![UgcMedia {
                status: "READY".to_string(),
                description: UgcText {
                    text: "Illustration generated for this post".to_string(),
                },
                media: asset.to_string(),
                title: UgcText {
                    text: "Post illustration".to_string(),
                },
            }],
        ),
        None => ("NONE", Vec::new()),
    };

    UgcPost {
        author: author_urn.to_string(),
        lifecycle_state: "PUBLISHED".to_string(),
        specific_content: UgcSpecificContent {
            share_content: UgcShareContent {
                share_commentary: UgcText { text: text.to_string() },
                share_media_category: category.to_string(),
                media,
            },
        },
        visibility: UgcVisibility {
            visibility: "PUBLIC".to_string(),
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUploadEnvelope {
    register_upload_request: RegisterUploadRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUploadRequest {
    recipes: Vec<String>,
    owner: String,
    service_relationships: Vec<ServiceRelationship>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRelationship {
    relationship_type: String,
    identifier: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UgcPost {
    pub author: String,
    pub lifecycle_state: String,
    pub specific_content: UgcSpecificContent,
    pub visibility: UgcVisibility,
}

#[derive(Debug, Clone, Serialize)]
pub struct UgcSpecificContent {
    #[serde(rename = "com.linkedin.ugc.ShareContent")]
    pub share_content: UgcShareContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UgcShareContent {
    pub share_commentary: UgcText,
    pub share_media_category: String,
    pub media: Vec<UgcMedia>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UgcText {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UgcMedia {
    pub status: String,
    pub description: UgcText,
    pub media: String,
    pub title: UgcText,
}

#[derive(Debug, Clone, Serialize)]
pub struct UgcVisibility {
    #[serde(rename = "com.linkedin.ugc.MemberNetworkVisibility")]
    pub visibility: String,
}

#[derive(Debug, Deserialize)]
struct PostCreated {
    id: Option<String>,
}
