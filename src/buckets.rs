use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::indexer::Indexer;
use crate::models::Bucket;

/// Indexing status of one bucket.
#[derive(Debug, Clone, Serialize)]
pub struct BucketStatus {
    pub bucket: Bucket,
    /// `OK`, `MISSING` or an error message.
    pub source: String,
    pub documents: usize,
    /// Entries in the current manifest, `None` if there is no readable manifest.
    pub manifest_entries: Option<usize>,
    /// Whether the manifest lists exactly the documents in the source directory.
    pub in_sync: bool,
}

pub fn get_bucket_statuses(config: &Config) -> Result<Vec<BucketStatus>> {
    let indexer = Indexer::from_config(config)?;

    let statuses = Bucket::ALL
        .iter()
        .map(|&bucket| {
            let (source, files) = if !indexer.source_dir(bucket).exists() {
                ("MISSING".to_string(), Vec::new())
            } else {
                match indexer.list_documents(bucket) {
                    Ok(files) => ("OK".to_string(), files),
                    Err(e) => (format!("ERROR: {}", e), Vec::new()),
                }
            };

            let manifest: Option<Vec<String>> =
                std::fs::read_to_string(indexer.manifest_path(bucket))
                    .ok()
                    .and_then(|raw| serde_json::from_str(&raw).ok());

            BucketStatus {
                bucket,
                source,
                documents: files.len(),
                in_sync: manifest.as_ref() == Some(&files),
                manifest_entries: manifest.map(|m| m.len()),
            }
        })
        .collect();

    Ok(statuses)
}

pub fn list_buckets(config: &Config) -> Result<()> {
    let statuses = get_bucket_statuses(config)?;

    println!(
        "{:<14} {:<10} {:>5} {:>9}  IN SYNC",
        "BUCKET", "SOURCE", "DOCS", "MANIFEST"
    );
    for s in &statuses {
        let manifest = s
            .manifest_entries
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<14} {:<10} {:>5} {:>9}  {}",
            s.bucket.as_str(),
            s.source,
            s.documents,
            manifest,
            s.in_sync
        );
    }

    Ok(())
}
