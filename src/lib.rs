//! Daily arXiv digest.
//!
//! Queries arXiv for each configured topic, merges the hits into a JSON store
//! keyed by topic and version-stripped paper id, and renders the store as a
//! Markdown report. Code links and star counts can be looked up best-effort.

pub mod arxiv;
pub mod code;
pub mod config;
pub mod error;
pub mod paper;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod store;

pub use error::{Error, Result};
pub use paper::{paper_key, PaperRecord};
pub use retry::{RetryPolicy, Transient};
pub use store::{TopicBatch, TopicStore};
