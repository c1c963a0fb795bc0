use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::error::Error;

// CL arguments for config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Daily arXiv digest: fetch papers per keyword, merge into a JSON store, render Markdown", long_about = None)]
pub struct Args {
    /// Topic and search query as TOPIC=QUERY. Repeat for several topics.
    #[arg(short, long = "keyword", value_name = "TOPIC=QUERY", default_values_t = default_keywords())]
    pub keywords: Vec<Keyword>,

    #[arg(short, long, default_value_t = 10)]
    pub max_results: usize,

    #[arg(long, env = "ARXIV_DAILY_STORE", default_value = "cv-arxiv-daily.json")]
    pub store: PathBuf,

    #[arg(long, env = "ARXIV_DAILY_REPORT", default_value = "README.md")]
    pub report: PathBuf,

    #[arg(long, env = "ARXIV_DAILY_ENDPOINT", default_value = crate::arxiv::DEFAULT_ENDPOINT)]
    pub arxiv_endpoint: String,

    #[arg(long, env = "ARXIV_DAILY_CODE_ENDPOINT", default_value = crate::code::DEFAULT_CODE_ENDPOINT)]
    pub code_endpoint: String,

    /// Seconds to wait between consecutive arXiv requests.
    #[arg(long, default_value_t = 3.0)]
    pub request_delay: f64,

    /// HTTP timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Print results with code links and stars instead of updating the store.
    #[arg(long, default_value_t = false)]
    pub preview: bool,

    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[arg(short, long, default_value_t = false, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Default tracing filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

/// A topic name and the query sent to arXiv for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub topic: String,
    pub query: String,
}

impl Keyword {
    pub fn new(topic: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            query: query.into(),
        }
    }
}

impl FromStr for Keyword {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (topic, query) = match s.split_once('=') {
            Some((topic, query)) => (topic.trim(), query.trim()),
            None => (s.trim(), s.trim()),
        };
        if topic.is_empty() || query.is_empty() {
            return Err(Error::Config(format!(
                "keyword `{s}` must be TOPIC=QUERY with both parts non-empty"
            )));
        }
        Ok(Self::new(topic, query))
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.topic, self.query)
    }
}

fn default_keywords() -> Vec<Keyword> {
    vec![Keyword::new("AI Agents", "AI Agents"), Keyword::new("SLAM", "SLAM")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_parses_topic_and_query() {
        let kw: Keyword = "Robotics = cat:cs.RO AND all:grasping".parse().unwrap();
        assert_eq!(kw, Keyword::new("Robotics", "cat:cs.RO AND all:grasping"));
    }

    #[test]
    fn bare_keyword_is_its_own_query() {
        assert_eq!("SLAM".parse::<Keyword>().unwrap(), Keyword::new("SLAM", "SLAM"));
    }

    #[test]
    fn empty_parts_are_rejected() {
        assert!(matches!("=SLAM".parse::<Keyword>(), Err(Error::Config(_))));
        assert!(matches!("SLAM=".parse::<Keyword>(), Err(Error::Config(_))));
        assert!(matches!("  ".parse::<Keyword>(), Err(Error::Config(_))));
    }

    #[test]
    fn defaults_match_original_topics() {
        let args = Args::parse_from(["arxiv_daily"]);
        assert_eq!(args.keywords, default_keywords());
        assert_eq!(args.max_results, 10);
        assert_eq!(args.store, PathBuf::from("cv-arxiv-daily.json"));
        assert_eq!(args.report, PathBuf::from("README.md"));
        assert_eq!(args.log_filter(), "info");
    }

    #[test]
    fn repeated_keyword_flags_replace_defaults() {
        let args = Args::parse_from(["arxiv_daily", "-k", "NeRF=neural radiance", "-k", "SLAM", "-v"]);
        assert_eq!(
            args.keywords,
            vec![Keyword::new("NeRF", "neural radiance"), Keyword::new("SLAM", "SLAM")]
        );
        assert_eq!(args.log_filter(), "debug");
    }
}
