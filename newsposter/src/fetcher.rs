use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetching {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Upper bound on attempts per fetch, whatever the configuration says.
const MAX_ATTEMPTS: u32 = 10;

/// Plain page fetcher with a per-request timeout and bounded retries.
///
/// 5xx, 429 and transport errors are retried with exponential backoff (1s, 2s, 4s... up to 32s);
/// any other non-success status fails on the first attempt.
#[derive(Clone)]
pub struct ContentFetcher {
    client: Client,
    max_retries: u32,
}

impl ContentFetcher {
    pub fn new(timeout_secs: u64, max_retries: u32, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_retries: max_retries.clamp(1, MAX_ATTEMPTS),
        })
    }

    /// GET `url` and return the body text. Never returns a body for a non-success status.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                let backoff = backoff_delay(attempt);
                info!("Retrying fetch for {} (attempt {}/{}) after {:?}...", url, attempt, self.max_retries, backoff);
                tokio::time::sleep(backoff).await;
            }

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.text().await.map_err(|source| FetchError::Network {
                            url: url.to_string(),
                            source,
                        })?;
                        debug!("fetched {} ({} bytes)", url, body.len());
                        return Ok(body);
                    }

                    let err = FetchError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    };
                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(err);
                        continue;
                    }
                    // Client error (4xx) - likely permanent, don't retry
                    return Err(err);
                }
                Err(source) => {
                    last_error = Some(FetchError::Network {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 0,
        }))
    }
}

/// Sleep before `attempt` (2-based): 1s, 2s, 4s ... capped at 32s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(2).min(5))
}
