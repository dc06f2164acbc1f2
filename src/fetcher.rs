//! Page fetching and link discovery used by the crawl workers.

use crate::{CandidateUrl, Config, FetchError, FrontierError};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Retrieves pages and pulls outgoing links from them.
///
/// Workers call `fetch` and then `extract_links` on whatever came back. Both
/// may fail or panic without taking the worker down.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &CandidateUrl) -> Result<String, FetchError>;

    /// Absolute URLs linked from `content`, in document order.
    fn extract_links(&self, page: &CandidateUrl, content: &str) -> Vec<String>;
}

/// Plain HTTP GET with `<a href>` link extraction.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    links: Selector,
    follow_external_links: bool,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, FrontierError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|e| FrontierError::Configuration(format!("HTTP client: {}", e)))?;
        let links = Selector::parse("a[href]")
            .map_err(|e| FrontierError::Configuration(format!("Link selector: {:?}", e)))?;

        Ok(Self {
            client,
            timeout,
            links,
            follow_external_links: true,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FrontierError> {
        Ok(Self::new(config.fetch_timeout, config.user_agent.as_deref())?
            .follow_external_links(config.follow_external_links))
    }

    /// When `false`, only links on the page's own host are reported.
    pub fn follow_external_links(mut self, follow: bool) -> Self {
        self.follow_external_links = follow;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &CandidateUrl) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| self.map_error(e))
    }

    fn extract_links(&self, page: &CandidateUrl, content: &str) -> Vec<String> {
        let document = Html::parse_document(content);
        let links: Vec<String> = document
            .select(&self.links)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| resolve_link(page.as_url(), href))
            .filter(|link| self.follow_external_links || same_host(page.as_url(), link))
            .collect();

        debug!("Found {} links on {}", links.len(), page);
        links
    }
}

impl HttpFetcher {
    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::from(err)
        }
    }
}

/// Resolves `href` against the page it was found on. Only web links survive.
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.into()),
        _ => None,
    }
}

fn same_host(page: &Url, link: &str) -> bool {
    match (page.host_str(), Url::parse(link)) {
        (Some(host), Ok(link)) => link
            .host_str()
            .map_or(false, |other| other.eq_ignore_ascii_case(host)),
        _ => false,
    }
}
