//! arXiv search over the Atom export API.
//!
//! Results come back newest submission first. Requests issued through one
//! [`ArxivClient`] are spaced by a politeness delay, and every page request
//! runs under the client's [`RetryPolicy`].

use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::{Client, Url};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::paper::{collapse_whitespace, paper_key, short_id, PaperRecord};
use crate::retry::RetryPolicy;
use crate::store::TopicBatch;

pub const DEFAULT_ENDPOINT: &str = "https://export.arxiv.org/api/query";
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(3);
const PAGE_SIZE: usize = 100;

pub struct ArxivClient {
    http: Client,
    endpoint: Url,
    retry: RetryPolicy,
    request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ArxivClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            // Constant, always parses
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            retry: RetryPolicy::search(),
            request_delay: DEFAULT_REQUEST_DELAY,
            last_request: Mutex::new(None),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = Url::parse(endpoint.trim())
            .map_err(|e| Error::Config(format!("invalid arXiv endpoint `{endpoint}`: {e}")))?;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Fetches up to `max_results` papers for `query` and keys their rows for the store.
    pub async fn fetch_topic(&self, topic: &str, query: &str, max_results: usize) -> Result<TopicBatch> {
        let papers = self.search(query, max_results).await?;
        for paper in &papers {
            info!(
                published = %paper.published,
                title = %paper.title,
                author = %paper.first_author,
                "paper"
            );
        }
        Ok(TopicBatch::from_records(topic, &papers))
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PaperRecord>> {
        let mut papers: Vec<PaperRecord> = Vec::new();

        while papers.len() < max_results {
            let start = papers.len();
            let size = (max_results - start).min(PAGE_SIZE);
            let page = self
                .retry
                .run("arxiv search", || self.fetch_page(query, start, size))
                .await?;

            let fetched = page.len();
            papers.extend(page);
            if fetched < size {
                break;
            }
        }

        papers.truncate(max_results);
        Ok(papers)
    }

    async fn fetch_page(&self, query: &str, start: usize, size: usize) -> Result<Vec<PaperRecord>> {
        self.throttle().await;
        debug!(%query, start, size, endpoint = %self.endpoint, "querying arXiv");

        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[
                ("search_query", query),
                ("start", &start.to_string()),
                ("max_results", &size.to_string()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let body = response.text().await?;
        parse_feed(&body)
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.request_delay {
                sleep(self.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
}

#[derive(Default)]
struct EntryBuilder {
    id_url: String,
    title: String,
    summary: String,
    published: String,
    updated: String,
    authors: Vec<String>,
    primary_category: Option<String>,
    in_author: bool,
    field: Option<Field>,
    text: String,
}

impl EntryBuilder {
    fn open(&mut self, name: &[u8]) {
        let field = match name {
            b"id" => Field::Id,
            b"title" => Field::Title,
            b"summary" => Field::Summary,
            b"published" => Field::Published,
            b"updated" => Field::Updated,
            b"name" if self.in_author => Field::AuthorName,
            b"author" => {
                self.in_author = true;
                return;
            }
            _ => return,
        };
        self.field = Some(field);
        self.text.clear();
    }

    fn close(&mut self, name: &[u8]) {
        if name == b"author" {
            self.in_author = false;
            return;
        }
        let Some(field) = self.field.take() else {
            return;
        };
        let text = collapse_whitespace(&self.text);
        self.text.clear();
        match field {
            Field::Id => self.id_url = text,
            Field::Title => self.title = text,
            Field::Summary => self.summary = text,
            Field::Published => self.published = text,
            Field::Updated => self.updated = text,
            Field::AuthorName if !text.is_empty() => self.authors.push(text),
            Field::AuthorName => {}
        }
    }

    fn category(&mut self, tag: &BytesStart<'_>) -> Result<()> {
        for attr in tag.attributes() {
            let attr = attr.map_err(|e| Error::Feed(e.to_string()))?;
            if attr.key.local_name().as_ref() == b"term" {
                let value = attr.unescape_value().map_err(|e| Error::Feed(e.to_string()))?;
                if !value.trim().is_empty() {
                    self.primary_category = Some(value.trim().to_string());
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<PaperRecord> {
        // The API reports query errors as a single pseudo-entry
        if self.id_url.contains("/api/errors") {
            return Err(Error::Feed(format!("arXiv rejected the query: {}", self.summary)));
        }

        let id = short_id(&self.id_url)
            .ok_or_else(|| Error::Feed(format!("entry without an abs id: `{}`", self.id_url)))?
            .to_string();
        let published = parse_date(&self.published, "published", &id)?;
        let updated = if self.updated.is_empty() {
            published
        } else {
            parse_date(&self.updated, "updated", &id)?
        };
        let first_author = self
            .authors
            .first()
            .cloned()
            .ok_or_else(|| Error::Feed(format!("entry {id} has no authors")))?;

        Ok(PaperRecord {
            key: paper_key(&id).to_string(),
            id,
            title: self.title,
            url: self.id_url,
            first_author,
            authors: self.authors,
            summary: self.summary,
            primary_category: self.primary_category,
            published,
            updated,
        })
    }
}

fn parse_date(raw: &str, field: &str, id: &str) -> Result<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|e| Error::Feed(format!("entry {id} has bad {field} date `{raw}`: {e}")))
}

/// Parses an arXiv Atom feed into records, in feed order.
pub fn parse_feed(body: &str) -> Result<Vec<PaperRecord>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::Feed(format!("XML error at byte {}: {e}", reader.buffer_position()))
        })?;

        match event {
            Event::Eof => break,
            Event::Start(tag) => {
                let name = tag.local_name();
                if name.as_ref() == b"entry" {
                    entry = Some(EntryBuilder::default());
                } else if let Some(current) = entry.as_mut() {
                    if name.as_ref() == b"primary_category" {
                        current.category(&tag)?;
                    } else {
                        current.open(name.as_ref());
                    }
                }
            }
            Event::Empty(tag) => {
                if let Some(current) = entry.as_mut() {
                    if tag.local_name().as_ref() == b"primary_category" {
                        current.category(&tag)?;
                    }
                }
            }
            Event::Text(text) => {
                if let Some(current) = entry.as_mut().filter(|e| e.field.is_some()) {
                    let text = text.unescape().map_err(|e| Error::Feed(e.to_string()))?;
                    current.text.push_str(&text);
                    current.text.push(' ');
                }
            }
            Event::CData(data) => {
                if let Some(current) = entry.as_mut().filter(|e| e.field.is_some()) {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                    current.text.push(' ');
                }
            }
            Event::End(tag) => {
                let name = tag.local_name();
                if name.as_ref() == b"entry" {
                    if let Some(done) = entry.take() {
                        papers.push(done.finish()?);
                    }
                } else if let Some(current) = entry.as_mut() {
                    current.close(name.as_ref());
                }
            }
            _ => {}
        }
    }

    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <id>https://arxiv.org/api/abc</id>
  <title>arXiv Query: search_query=all:SLAM</title>
  <updated>2024-05-02T00:00:00Z</updated>
  <entry>
    <id>http://arxiv.org/abs/2405.00002v2</id>
    <updated>2024-05-03T10:00:00Z</updated>
    <published>2024-05-01T23:30:00Z</published>
    <title>Loop Closure
      for Sparse SLAM</title>
    <summary>We close
      loops &amp; maps.</summary>
    <author><name>Grace Hopper</name></author>
    <author><name>Edsger Dijkstra</name></author>
    <link href="http://arxiv.org/abs/2405.00002v2" rel="alternate" type="text/html"/>
    <arxiv:primary_category term="cs.RO" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.RO" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2405.00001v1</id>
    <updated>2024-05-01T08:00:00Z</updated>
    <published>2024-05-01T08:00:00Z</published>
    <title>Visual Odometry</title>
    <summary>Short.</summary>
    <author><name>Barbara Liskov</name></author>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_in_feed_order() {
        let papers = parse_feed(FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.id, "2405.00002v2");
        assert_eq!(first.key, "2405.00002");
        assert_eq!(first.title, "Loop Closure for Sparse SLAM");
        assert_eq!(first.summary, "We close loops & maps.");
        assert_eq!(first.url, "http://arxiv.org/abs/2405.00002v2");
        assert_eq!(first.first_author, "Grace Hopper");
        assert_eq!(first.authors.len(), 2);
        assert_eq!(first.primary_category.as_deref(), Some("cs.RO"));
        assert_eq!(first.published, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(first.updated, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());

        assert_eq!(papers[1].key, "2405.00001");
        assert_eq!(papers[1].primary_category, None);
    }

    #[test]
    fn feed_without_entries_is_empty() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>none</title></feed>"#;
        assert!(parse_feed(body).unwrap().is_empty());
    }

    #[test]
    fn api_error_entry_is_reported() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
            <id>http://arxiv.org/api/errors#incorrect_id_format</id>
            <title>Error</title>
            <summary>incorrect id format</summary>
        </entry></feed>"#;
        let err = parse_feed(body).unwrap_err();
        assert!(matches!(err, Error::Feed(ref msg) if msg.contains("incorrect id format")));
    }

    #[test]
    fn bad_published_date_is_a_feed_error() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
            <id>http://arxiv.org/abs/2405.00003v1</id>
            <published>yesterday</published>
            <title>T</title>
            <author><name>A</name></author>
        </entry></feed>"#;
        assert!(matches!(parse_feed(body), Err(Error::Feed(_))));
    }

    #[test]
    fn truncated_xml_is_a_feed_error() {
        assert!(matches!(
            parse_feed("<feed><entry><id>http://arxiv.org/abs/1v1</id></feed>"),
            Err(Error::Feed(_))
        ));
    }
}
