use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use tracing::warn;
use url::Url;

use crate::config::{FetchSettings, TargetSettings};
use crate::error::FetchError;

const MAX_REDIRECTS: usize = 10;
const MAX_RETRIES: u32 = 10;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retrieves the target page. Only hosts on the allow-list are requested,
/// including redirect hops.
pub struct PageFetcher {
    client: Client,
    allowed: Vec<String>,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl PageFetcher {
    pub fn new(target: &TargetSettings, fetch: &FetchSettings) -> Result<Self, FetchError> {
        let allowed: Vec<String> = target
            .allowed_domains
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .collect();

        let redirect_allowed = allowed.clone();
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if host_allowed(&redirect_allowed, attempt.url()) {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });

        let client = Client::builder()
            .user_agent(fetch.user_agent.as_str())
            .redirect(policy)
            .build()
            .map_err(|source| FetchError::Request {
                url: target.url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            allowed,
            timeout: fetch.timeout(),
            max_retries: fetch.max_retries.min(MAX_RETRIES),
            backoff: Duration::from_millis(fetch.backoff_ms),
        })
    }

    /// Parse `url` and make sure its host is allowed.
    pub fn check_url(&self, url: &str) -> Result<Url, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        if !host_allowed(&self.allowed, &parsed) {
            return Err(FetchError::DisallowedHost {
                host: parsed.host_str().unwrap_or_default().to_string(),
            });
        }
        Ok(parsed)
    }

    /// GET the page body, retrying rate limits and server errors with
    /// exponential backoff.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let url = self.check_url(url)?;

        let mut attempt = 0;
        loop {
            match self.fetch_once(&url).await {
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    let backoff = backoff_for(self.backoff, attempt);
                    warn!(
                        "{} (attempt {}/{}), backing off {:.1}s",
                        e,
                        attempt + 1,
                        self.max_retries,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        match tokio::time::timeout(self.timeout, self.get_body(url)).await {
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }),
            Ok(Err(source)) => Err(FetchError::Request {
                url: url.to_string(),
                source,
            }),
            Ok(Ok(Err(status))) => Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
            Ok(Ok(Ok(body))) => Ok(body),
        }
    }

    async fn get_body(&self, url: &Url) -> Result<Result<String, StatusCode>, reqwest::Error> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(Err(status));
        }
        Ok(Ok(response.text().await?))
    }
}

/// `base * 2^attempt`, capped at [`MAX_BACKOFF`].
fn backoff_for(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_BACKOFF)
}

fn host_allowed(allowed: &[String], url: &Url) -> bool {
    url.host_str()
        .map(|h| h.to_ascii_lowercase())
        .is_some_and(|h| allowed.iter().any(|a| *a == h))
}

fn is_retryable(error: &FetchError) -> bool {
    match error {
        FetchError::Status { status, .. } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::OK);
            status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        FetchError::Timeout { .. } => true,
        FetchError::Request { source, .. } => source.is_connect() || source.is_timeout(),
        _ => false,
    }
}
