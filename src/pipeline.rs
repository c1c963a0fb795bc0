use chrono::NaiveDate;
use reqwest::Client;
use tokio::time::Duration;
use tracing::info;

use crate::arxiv::ArxivClient;
use crate::code::CodeLookup;
use crate::config::Args;
use crate::error::{Error, Result};
use crate::report::write_report;
use crate::store::{update_store, TopicBatch, TopicStore};

const USER_AGENT: &str = concat!("arxiv-daily/", env!("CARGO_PKG_VERSION"));

/// Everything one run needs, built once from the command line.
pub struct DailyDigest {
    arxiv: ArxivClient,
    code: CodeLookup,
    args: Args,
}

impl DailyDigest {
    pub fn new(args: Args) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(args.timeout))
            .build()?;

        let request_delay = Duration::try_from_secs_f64(args.request_delay)
            .map_err(|e| Error::Config(format!("invalid request delay {}: {e}", args.request_delay)))?;

        let arxiv = ArxivClient::new(http.clone())
            .with_endpoint(&args.arxiv_endpoint)?
            .with_request_delay(request_delay);
        let code = CodeLookup::new(http).with_endpoint(&args.code_endpoint);

        Ok(Self::from_parts(arxiv, code, args))
    }

    /// Assembles a run from preconfigured clients.
    pub fn from_parts(arxiv: ArxivClient, code: CodeLookup, args: Args) -> Self {
        Self { arxiv, code, args }
    }

    /// Fetches every keyword, merges into the store, and regenerates the report.
    pub async fn run(&self, today: NaiveDate) -> Result<TopicStore> {
        println!("{}", "=".repeat(64));
        println!("   Daily arXiv digest");
        println!("{}", "=".repeat(64));
        println!("Topics: {}", self.args.keywords.len());
        println!("Max results per topic: {}", self.args.max_results);
        println!("Store: {}", self.args.store.display());
        println!("Report: {}\n", self.args.report.display());

        let batches = self.collect().await?;
        let fetched: usize = batches.iter().map(|b| b.papers.len()).sum();

        let store = update_store(&self.args.store, batches)?;
        info!("store updated");

        write_report(&self.args.report, &store, today)?;

        println!("\n{}", "=".repeat(64));
        println!("Results");
        println!("{}", "=".repeat(64));
        println!("Fetched this run: {}", fetched);
        println!("Papers in store: {}", store.paper_count());
        println!("Report: {}\n", self.args.report.display());

        Ok(store)
    }

    async fn collect(&self) -> Result<Vec<TopicBatch>> {
        let mut batches = Vec::with_capacity(self.args.keywords.len());
        for keyword in &self.args.keywords {
            info!(topic = %keyword.topic, query = %keyword.query, "collecting papers");
            let batch = self
                .arxiv
                .fetch_topic(&keyword.topic, &keyword.query, self.args.max_results)
                .await?;
            batches.push(batch);
        }
        Ok(batches)
    }

    /// Prints each hit with its code link and stars; the store is left alone.
    pub async fn preview(&self) -> Result<()> {
        for keyword in &self.args.keywords {
            println!("\n{}", "=".repeat(64));
            println!("{} (query: {})", keyword.topic, keyword.query);
            println!("{}", "=".repeat(64));

            let papers = self.arxiv.search(&keyword.query, self.args.max_results).await?;
            for paper in papers {
                let code_url = self.code.official_code_url(&paper.id).await;
                let stars = match &code_url {
                    Some(url) => self.code.stars(url).await.to_string(),
                    None => "N/A".to_string(),
                };
                let summary: String = paper.summary.chars().take(100).collect();

                println!("[{}] {}", paper.id, paper.title);
                println!("  URL: {}", paper.url);
                println!("  Author: {}", paper.first_author);
                println!("  All authors: {}", paper.authors_joined());
                println!("  Published: {}, Updated: {}", paper.published, paper.updated);
                if let Some(category) = &paper.primary_category {
                    println!("  Category: {}", category);
                }
                println!("  Summary: {}...", summary);
                println!("  Code: {}", code_url.as_deref().unwrap_or("Not found"));
                println!("  Stars: {}", stars);
                println!("{}", "-".repeat(64));
            }
        }
        Ok(())
    }
}
