//! Best-effort lookup of a paper's official code repository and its star count.
//!
//! Nothing here fails: every error is logged and folded into `None` or `0`.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

pub const DEFAULT_CODE_ENDPOINT: &str = "https://arxiv.paperswithcode.com/api/v0/papers/";

#[derive(Debug, Deserialize)]
struct CodeLinks {
    #[serde(default)]
    official: Option<OfficialRepo>,
}

#[derive(Debug, Deserialize)]
struct OfficialRepo {
    url: String,
}

pub struct CodeLookup {
    http: Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl CodeLookup {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            endpoint: DEFAULT_CODE_ENDPOINT.to_string(),
            retry: RetryPolicy::lookup(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        let mut endpoint = endpoint.trim().to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        self.endpoint = endpoint;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// URL of the paper's official implementation, if one is listed.
    pub async fn official_code_url(&self, paper_id: &str) -> Option<String> {
        let url = format!("{}{}", self.endpoint, paper_id);
        match self.retry.run("code link", || self.fetch_code_links(&url)).await {
            Ok(links) => links.official.map(|repo| repo.url),
            Err(e) => {
                warn!(%paper_id, error = %e, "code link lookup failed");
                None
            }
        }
    }

    /// Star count scraped from the repository page, `0` when unavailable.
    pub async fn stars(&self, repo_url: &str) -> u64 {
        match self.retry.run("stars", || self.fetch_page(repo_url)).await {
            Ok(html) => parse_stars(&html).unwrap_or_else(|| {
                debug!(%repo_url, "no stargazers link on page");
                0
            }),
            Err(e) => {
                warn!(%repo_url, error = %e, "star lookup failed");
                0
            }
        }
    }

    async fn fetch_code_links(&self, url: &str) -> Result<CodeLinks> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Reads the count off the first link pointing at a `/stargazers` page.
pub fn parse_stars(html: &str) -> Option<u64> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"a[href$="/stargazers"]"#).ok()?;
    let anchor = document.select(&selector).next()?;
    let text = anchor.text().collect::<String>();
    parse_count(&text)
}

/// `"1,234"` -> 1234, `"1.2k"` -> 1200, `"3m"` -> 3000000
fn parse_count(text: &str) -> Option<u64> {
    static COUNT: OnceLock<Regex> = OnceLock::new();
    let re = COUNT.get_or_init(|| Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*([kKmM]?)").unwrap());

    let caps = re.captures(text.trim())?;
    let number: f64 = caps[1].replace(',', "").parse().ok()?;
    let scale = match &caps[2] {
        "k" | "K" => 1_000.0,
        "m" | "M" => 1_000_000.0,
        _ => 1.0,
    };
    Some((number * scale).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_stargazers_anchor() {
        let html = r#"<html><body>
            <a href="/owner/repo/forks">12</a>
            <a href="/owner/repo/stargazers"> <span>1,234</span> stars </a>
            <a href="/other/stargazers">99</a>
        </body></html>"#;
        assert_eq!(parse_stars(html), Some(1234));
    }

    #[test]
    fn page_without_anchor_has_no_count() {
        assert_eq!(parse_stars("<html><a href=\"/owner/repo\">repo</a></html>"), None);
        assert_eq!(parse_stars("<a href=\"/x/stargazers\">Star</a>"), None);
    }

    #[test]
    fn abbreviated_counts_expand() {
        assert_eq!(parse_count("1.2k"), Some(1200));
        assert_eq!(parse_count("3M"), Some(3_000_000));
        assert_eq!(parse_count("42"), Some(42));
    }

    #[test]
    fn endpoint_gets_trailing_slash() {
        let lookup = CodeLookup::new(Client::new()).with_endpoint("http://localhost/api/v0/papers");
        assert_eq!(lookup.endpoint, "http://localhost/api/v0/papers/");
    }
}
