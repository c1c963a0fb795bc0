use chrono::NaiveDate;

/// One search hit, as returned by the arXiv feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperRecord {
    /// Short identifier including its version, e.g. `2108.09112v2`.
    pub id: String,
    /// Version-stripped identifier used as the store key.
    pub key: String,
    pub title: String,
    /// Entry URL (`http://arxiv.org/abs/<id>`).
    pub url: String,
    pub first_author: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub primary_category: Option<String>,
    pub published: NaiveDate,
    pub updated: NaiveDate,
}

impl PaperRecord {
    /// Markdown table row stored per paper and copied verbatim into the report.
    pub fn table_row(&self) -> String {
        format!(
            "|**{}**|**{}**|{} et.al.|[{}]({})|\n",
            self.published, self.title, self.first_author, self.id, self.url
        )
    }

    pub fn authors_joined(&self) -> String {
        self.authors.join(", ")
    }
}

/// `2108.09112v1` -> `2108.09112`. Everything from the first `v` is dropped.
pub fn paper_key(id: &str) -> &str {
    match id.find('v') {
        Some(pos) => &id[..pos],
        None => id,
    }
}

/// `http://arxiv.org/abs/2108.09112v2` -> `2108.09112v2`
pub fn short_id(entry_url: &str) -> Option<&str> {
    let url = entry_url.trim();
    let pos = url.rfind("/abs/")?;
    let id = url[pos + "/abs/".len()..].trim_matches('/');
    (!id.is_empty()).then_some(id)
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
