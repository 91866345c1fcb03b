use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    /// Authoring tree: `<source_root>/<bucket>/*.json`.
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    /// Publish tree: manifests at `<publish_root>/<bucket>.json`, documents
    /// copied to `<publish_root>/<bucket>/`. Without publishing, manifests
    /// are written to `<source_root>/<bucket>.json` instead.
    #[serde(default = "default_publish_root")]
    pub publish_root: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            publish_root: default_publish_root(),
        }
    }
}

fn default_source_root() -> PathBuf {
    PathBuf::from("src/content")
}
fn default_publish_root() -> PathBuf {
    PathBuf::from("public/content")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_publish")]
    pub publish: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            publish: default_publish(),
        }
    }
}

fn default_publish() -> bool {
    true
}

/// What the loader does when a bucket's manifest does not exist.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingManifest {
    /// Treat the bucket as empty.
    #[default]
    Empty,
    /// Fail the bucket with `ManifestMissing`.
    Error,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    /// Directory path or `http(s)://` base URL the manifests are read from.
    #[serde(default = "default_base")]
    pub base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub missing_manifest: MissingManifest,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            missing_manifest: MissingManifest::default(),
        }
    }
}

impl LoaderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_remote(&self) -> bool {
        self.base.starts_with("http://") || self.base.starts_with("https://")
    }
}

fn default_base() -> String {
    "public/content".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_concurrency() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    /// Shown for optional amounts that are not set.
    #[serde(default = "default_unknown_placeholder")]
    pub unknown_placeholder: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            unknown_placeholder: default_unknown_placeholder(),
        }
    }
}

fn default_currency_symbol() -> String {
    "$".to_string()
}
fn default_unknown_placeholder() -> String {
    "N/A".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.loader.base.trim().is_empty() {
        anyhow::bail!("loader.base must not be empty");
    }

    if config.loader.timeout_secs == 0 {
        anyhow::bail!("loader.timeout_secs must be > 0");
    }

    if config.loader.concurrency == 0 {
        anyhow::bail!("loader.concurrency must be > 0");
    }

    if config.content.source_root == config.content.publish_root && config.index.publish {
        anyhow::bail!(
            "content.source_root and content.publish_root must differ when index.publish is enabled"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(body: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dcx.toml");
        std::fs::write(&path, body).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let (_tmp, path) = write_config("");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.content.source_root, PathBuf::from("src/content"));
        assert_eq!(cfg.content.publish_root, PathBuf::from("public/content"));
        assert!(cfg.index.publish);
        assert_eq!(cfg.loader.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.loader.missing_manifest, MissingManifest::Empty);
        assert_eq!(cfg.display.currency_symbol, "$");
    }

    #[test]
    fn test_full_config() {
        let (_tmp, path) = write_config(
            r#"
[content]
source_root = "content"
publish_root = "dist/content"

[index]
publish = false

[loader]
base = "https://example.org/content"
timeout_secs = 3
concurrency = 2
missing_manifest = "error"

[display]
currency_symbol = "€"
unknown_placeholder = "Call us"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert!(!cfg.index.publish);
        assert!(cfg.loader.is_remote());
        assert_eq!(cfg.loader.concurrency, 2);
        assert_eq!(cfg.loader.missing_manifest, MissingManifest::Error);
        assert_eq!(cfg.display.unknown_placeholder, "Call us");
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let (_tmp, path) = write_config("[loader]\ntimeout_secs = 0\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_rejects_publish_into_source() {
        let (_tmp, path) =
            write_config("[content]\nsource_root = \"content\"\npublish_root = \"content\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = load_config(Path::new("/nonexistent/dcx.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
