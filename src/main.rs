// Daily arXiv digest
// Fetches new papers per topic, merges them into a JSON store and renders README.md.

// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use anyhow::{Context, Result};
use arxiv_daily::config::Args;
use arxiv_daily::pipeline::DailyDigest;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

// Parse CL arguments, init logging, run once
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let preview = args.preview;
    let digest = DailyDigest::new(args).context("failed to set up HTTP clients")?;

    let outcome = if preview {
        digest.preview().await
    } else {
        let today = chrono::Local::now().date_naive();
        digest.run(today).await.map(|_| ())
    };

    if let Err(e) = &outcome {
        error!(error = %e, "run failed");
    }
    outcome.context("daily digest run failed")
}
