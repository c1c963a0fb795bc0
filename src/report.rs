use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use crate::error::Result;
use crate::store::{write_atomically, TopicStore};

const TABLE_HEADER: &str = "|Publish Date|Title|Authors|PDF|\n|---|---|---|---|\n";

/// Renders the Markdown report. Topics without papers are left out and rows
/// run newest first by paper key.
pub fn render(store: &TopicStore, date: NaiveDate) -> String {
    let mut out = format!("## Updated on {}\n\n", date.format("%Y.%m.%d"));

    for (topic, rows) in store.topics() {
        if rows.is_empty() {
            continue;
        }
        out.push_str(&format!("## {topic}\n\n"));
        out.push_str(TABLE_HEADER);

        let mut keys: Vec<&String> = rows.keys().collect();
        keys.sort_unstable_by(|a, b| b.cmp(a));
        for key in keys {
            out.push_str(&rows[key]);
        }
        out.push('\n');
    }

    out
}

/// Overwrites `path` with the rendered report.
pub fn write_report(path: &Path, store: &TopicStore, date: NaiveDate) -> Result<()> {
    write_atomically(path, render(store, date).as_bytes())?;
    info!(path = %path.display(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PaperRows, TopicBatch};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    }

    fn batch(topic: &str, pairs: &[(&str, &str)]) -> TopicBatch {
        let papers: PaperRows = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TopicBatch::new(topic, papers)
    }

    #[test]
    fn empty_store_renders_only_the_date_header() {
        assert_eq!(render(&TopicStore::new(), date()), "## Updated on 2024.05.02\n\n");
    }

    #[test]
    fn rows_are_sorted_newest_key_first() {
        let mut store = TopicStore::new();
        store.merge([batch(
            "SLAM",
            &[("2401.00001", "|old|\n"), ("2405.00009", "|new|\n"), ("2403.00005", "|mid|\n")],
        )]);

        assert_eq!(
            render(&store, date()),
            "## Updated on 2024.05.02\n\n\
             ## SLAM\n\n\
             |Publish Date|Title|Authors|PDF|\n|---|---|---|---|\n\
             |new|\n|mid|\n|old|\n\n"
        );
    }

    #[test]
    fn empty_topics_are_skipped() {
        let mut store = TopicStore::new();
        store.merge([batch("NeRF", &[]), batch("SLAM", &[("1", "|row|\n")])]);

        let report = render(&store, date());
        assert!(!report.contains("## NeRF"));
        assert!(report.contains("## SLAM\n\n"));
    }

    #[test]
    fn report_file_is_replaced_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("README.md");
        std::fs::write(&path, "stale content\n").unwrap();

        write_report(&path, &TopicStore::new(), date()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "## Updated on 2024.05.02\n\n"
        );
    }
}
