use super::connect;
use crate::IndexArgs;
use anyhow::{bail, Context, Result};
use apidesk::ingest::{IngestReport, Ingestor};
use cliclack::spinner;
use console::style;
use std::path::Path;

pub async fn execute(args: &IndexArgs, file: &Path, max_chunk_size: usize) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let connection = connect(args).await?;

    let spin = spinner();
    spin.start(format!("Embedding {}", file.display()));
    let report = Ingestor::new(connection.embedder, connection.store)
        .run(&connection.handle, &text, max_chunk_size)
        .await;
    spin.stop(format!("Processed {}", file.display()));

    println!("{}", summary(&connection.handle.name, &report));

    if report.chunks > 0 && report.upserted == 0 {
        bail!("No chunks were stored in {}", connection.handle.name);
    }
    Ok(())
}

pub fn summary(index: &str, report: &IngestReport) -> String {
    let mut lines = vec![format!(
        "{} {} of {} chunks stored in {}",
        if report.is_complete() {
            style("✔").green()
        } else {
            style("!").yellow()
        },
        report.upserted,
        report.chunks,
        style(index).bold()
    )];

    if !report.skipped.is_empty() {
        lines.push(format!(
            "  chunks that could not be embedded: {}",
            join(&report.skipped)
        ));
    }
    if !report.failed_batches.is_empty() {
        lines.push(format!(
            "  upsert batches that failed: {}",
            join(&report.failed_batches)
        ));
    }
    lines.join("\n")
}

fn join(positions: &[usize]) -> String {
    positions
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_summary_complete() {
        let report = IngestReport {
            chunks: 3,
            embedded: 3,
            upserted: 3,
            ..Default::default()
        };
        let summary = summary("docs", &report);
        assert!(summary.contains("3 of 3 chunks stored in"));
        assert!(summary.contains("docs"));
        assert_eq!(summary.lines().count(), 1);
    }

    #[test]
    fn test_summary_lists_losses() {
        let report = IngestReport {
            chunks: 250,
            embedded: 248,
            skipped: vec![4, 17],
            upserted: 148,
            failed_batches: vec![1],
        };
        let summary = summary("docs", &report);
        assert!(summary.contains("148 of 250 chunks stored"));
        assert!(summary.contains("chunks that could not be embedded: 4, 17"));
        assert!(summary.contains("upsert batches that failed: 1"));
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_before_connecting() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("docs.md");
        let args = IndexArgs {
            openai_api_key: None,
            pinecone_api_key: None,
            index: "docs".to_string(),
            host: None,
        };

        let err = execute(&args, &missing, 1000).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to read"));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("docs.md");
        std::fs::write(&file, "The enrich endpoint accepts business emails.").unwrap();
        let args = IndexArgs {
            openai_api_key: None,
            pinecone_api_key: Some("pc-key".to_string()),
            index: "docs".to_string(),
            host: None,
        };

        let err = execute(&args, &file, 1000).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
