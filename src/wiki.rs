use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::config::Settings;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("page not found: {0}")]
    NotFound(String),
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
}

/// Anything that can hand back the HTML of a page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Build the article URL for a subject. Only spaces are rewritten; every
/// other character goes through as-is.
pub fn article_url(base: &str, subject: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), subject.replace(' ', "_"))
}

pub struct WikiClient {
    client: reqwest::Client,
}

impl WikiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(WikiClient { client })
    }
}

#[async_trait]
impl PageSource for WikiClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        check_status(response.status(), url)?;
        Ok(response.text().await?)
    }
}

fn check_status(status: StatusCode, url: &str) -> Result<(), FetchError> {
    if status == StatusCode::NOT_FOUND {
        Err(FetchError::NotFound(url.to_string()))
    } else if !status.is_success() {
        Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_WIKI_BASE_URL;

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(
            article_url(DEFAULT_WIKI_BASE_URL, "9P/Tempel 1"),
            "https://en.wikipedia.org/wiki/9P/Tempel_1"
        );
        assert_eq!(
            article_url(DEFAULT_WIKI_BASE_URL, "Menoetius"),
            "https://en.wikipedia.org/wiki/Menoetius"
        );
    }

    #[test]
    fn non_ascii_passes_through_unescaped() {
        assert_eq!(
            article_url("https://en.wikipedia.org/wiki/", "73P/Schwassmann–Wachmann"),
            "https://en.wikipedia.org/wiki/73P/Schwassmann–Wachmann"
        );
    }

    #[test]
    fn status_mapping() {
        assert!(check_status(StatusCode::OK, "u").is_ok());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, "u"),
            Err(FetchError::NotFound(url)) if url == "u"
        ));
        assert!(matches!(
            check_status(StatusCode::SERVICE_UNAVAILABLE, "u"),
            Err(FetchError::Status { status: 503, .. })
        ));
    }
}
