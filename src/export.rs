//! Export derived content as one JSON bundle for build-time embedding.
//!
//! Loads all four buckets through the configured source and writes a single
//! document with each bucket's view state (or failure message). A static
//! site can embed this file instead of fetching manifests at page load.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::aggregate::{Loader, SiteContent};
use crate::config::Config;
use crate::format::Formatter;
use crate::models::Bucket;
use crate::source;

/// Load every bucket and derive its view state.
pub async fn build_site(config: &Config, now: DateTime<Utc>) -> Result<SiteContent> {
    let source = source::from_config(&config.loader)?;
    let loader = Loader::from_config(source.as_ref(), &config.loader);
    let fmt = Formatter::new(&config.display);
    Ok(loader.load_site(now, &fmt).await)
}

/// Export the site bundle as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping. Buckets that failed to load are included with
/// their message; the export itself still succeeds.
pub async fn run_export(config: &Config, output: Option<&Path>, now: DateTime<Utc>) -> Result<()> {
    let site = build_site(config, now).await?;
    let failed = site.failed_buckets();
    let json = serde_json::to_string_pretty(&site)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} buckets ({} failed) to {}",
                Bucket::ALL.len() - failed.len(),
                failed.len(),
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    for bucket in failed {
        tracing::warn!(%bucket, "exported with load failure");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContentConfig, LoaderConfig};
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_export_writes_bundle() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("public");
        fs::create_dir_all(content.join("information")).unwrap();
        fs::write(content.join("information.json"), r#"["hours.json"]"#).unwrap();
        fs::write(
            content.join("information/hours.json"),
            r#"{"title":"Hours","body":"Mon-Fri\n6:30 AM - 6:00 PM"}"#,
        )
        .unwrap();
        fs::write(content.join("programs.json"), "not json").unwrap();

        let config = Config {
            content: ContentConfig::default(),
            loader: LoaderConfig {
                base: content.display().to_string(),
                ..LoaderConfig::default()
            },
            ..Config::default()
        };

        let out = tmp.path().join("dist/site-content.json");
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        run_export(&config, Some(&out), now).await.unwrap();

        let bundle: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(bundle["information"]["status"], "loaded");
        assert_eq!(
            bundle["information"]["data"][0]["description"],
            "Mon-Fri\n6:30 AM - 6:00 PM"
        );
        assert_eq!(bundle["programs"]["status"], "failed");
        assert!(bundle["programs"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Could not load programs."));
        assert_eq!(bundle["closures"]["status"], "loaded");
        assert_eq!(bundle["closures"]["data"]["upcoming"], serde_json::json!([]));
    }
}
