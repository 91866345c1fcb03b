//! Content transport.
//!
//! The loader reads manifests and documents through the [`ContentSource`]
//! trait. Paths are relative and slash-separated: `programs.json` for a
//! manifest, `programs/infants.json` for a document.
//!
//! | Implementation | Reads from |
//! |----------------|------------|
//! | [`DirSource`] | a local publish directory |
//! | [`HttpSource`] | a deployed site (`https://.../content`) |
//! | [`MemorySource`] | an in-process map, for tests and embedded content |

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use crate::config::LoaderConfig;
use crate::error::TransportError;

/// Fetches JSON resources by relative path.
///
/// `Ok(None)` means the resource does not exist. `Err` means it exists (or
/// may exist) but could not be retrieved or is not valid JSON.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Short human-readable location, used in logs.
    fn describe(&self) -> String;

    async fn fetch_json(&self, path: &str) -> Result<Option<Value>, TransportError>;
}

/// Build the source described by `[loader]`.
pub fn from_config(config: &LoaderConfig) -> Result<Box<dyn ContentSource>> {
    if config.is_remote() {
        Ok(Box::new(HttpSource::new(&config.base, config.timeout())?))
    } else {
        Ok(Box::new(DirSource::new(&config.base)))
    }
}

fn parse_json(path: &str, bytes: &[u8]) -> Result<Value, TransportError> {
    serde_json::from_slice(bytes).map_err(|source| TransportError::InvalidJson {
        path: path.to_string(),
        source,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Directory
// ═══════════════════════════════════════════════════════════════════════

pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContentSource for DirSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn fetch_json(&self, path: &str) -> Result<Option<Value>, TransportError> {
        let full = path
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part));

        match tokio::fs::read(&full).await {
            Ok(bytes) => parse_json(path, &bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TransportError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// HTTP
// ═══════════════════════════════════════════════════════════════════════

pub struct HttpSource {
    base: Url,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("Invalid content URL: {}", base))?;
        if base.cannot_be_a_base() {
            bail!("Invalid content URL: {} cannot hold a path", base);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { base, client })
    }

    /// Each path segment is appended percent-encoded, so `#`, `?` and `%`
    /// in file names stay part of the path.
    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|part| !part.is_empty()));
        }
        url
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    fn describe(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }

    async fn fetch_json(&self, path: &str) -> Result<Option<Value>, TransportError> {
        let request_failed = |e: reqwest::Error| TransportError::Request {
            path: path.to_string(),
            message: e.to_string(),
        };

        let resp = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(request_failed)?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(request_failed)?;
        parse_json(path, &bytes).map(Some)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════════════════════════════════

enum Entry {
    Json(Value),
    Failure(String),
    Delayed(Duration, Value),
}

/// In-memory source. Also serves content that was embedded at build time.
#[derive(Default)]
pub struct MemorySource {
    entries: HashMap<String, Entry>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, value: Value) -> &mut Self {
        self.entries.insert(path.into(), Entry::Json(value));
        self
    }

    /// Make `path` fail with a transport error.
    pub fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.entries
            .insert(path.into(), Entry::Failure(message.into()));
        self
    }

    /// Serve `value` for `path` only after `delay`.
    pub fn delay(&mut self, path: impl Into<String>, delay: Duration, value: Value) -> &mut Self {
        self.entries.insert(path.into(), Entry::Delayed(delay, value));
        self
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} entries)", self.entries.len())
    }

    async fn fetch_json(&self, path: &str) -> Result<Option<Value>, TransportError> {
        match self.entries.get(path) {
            None => Ok(None),
            Some(Entry::Json(value)) => Ok(Some(value.clone())),
            Some(Entry::Failure(message)) => Err(TransportError::Request {
                path: path.to_string(),
                message: message.clone(),
            }),
            Some(Entry::Delayed(delay, value)) => {
                tokio::time::sleep(*delay).await;
                Ok(Some(value.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dir_source_absent_vs_broken() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("programs")).unwrap();
        std::fs::write(tmp.path().join("programs.json"), r#"["infants.json"]"#).unwrap();
        std::fs::write(tmp.path().join("programs/infants.json"), "{not json").unwrap();

        let source = DirSource::new(tmp.path());
        assert_eq!(
            source.fetch_json("programs.json").await.unwrap(),
            Some(json!(["infants.json"]))
        );
        assert!(source.fetch_json("closures.json").await.unwrap().is_none());
        assert!(matches!(
            source.fetch_json("programs/infants.json").await,
            Err(TransportError::InvalidJson { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let mut source = MemorySource::new();
        source
            .insert("documents.json", json!([]))
            .fail("closures.json", "connection reset");

        assert_eq!(source.fetch_json("documents.json").await.unwrap(), Some(json!([])));
        assert!(source.fetch_json("programs.json").await.unwrap().is_none());
        let err = source.fetch_json("closures.json").await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_from_config_picks_transport() {
        let mut cfg = LoaderConfig::default();
        assert_eq!(from_config(&cfg).unwrap().describe(), "public/content");

        cfg.base = "https://example.org/content/".to_string();
        assert_eq!(
            from_config(&cfg).unwrap().describe(),
            "https://example.org/content"
        );
    }

    #[test]
    fn test_http_url_join() {
        let source =
            HttpSource::new("https://example.org/content/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.url("programs/infants.json").as_str(),
            "https://example.org/content/programs/infants.json"
        );

        let bare = HttpSource::new("https://example.org", Duration::from_secs(1)).unwrap();
        assert_eq!(
            bare.url("programs.json").as_str(),
            "https://example.org/programs.json"
        );
    }

    #[test]
    fn test_http_url_encodes_file_names() {
        let source =
            HttpSource::new("https://example.org/content", Duration::from_secs(1)).unwrap();

        let url = source.url("closures/week#2.json");
        assert_eq!(url.path(), "/content/closures/week%232.json");
        assert_eq!(url.fragment(), None);

        let url = source.url("closures/50%?.json");
        assert_eq!(url.path(), "/content/closures/50%25%3F.json");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_http_source_rejects_bad_base() {
        assert!(HttpSource::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpSource::new("mailto:office@example.org", Duration::from_secs(1)).is_err());
    }

    /// Serve canned responses keyed by request path on a local port.
    async fn serve(routes: Vec<(&'static str, &'static str, &'static str)>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("").to_string();

                let (status, body) = routes
                    .iter()
                    .find(|(p, _, _)| *p == path)
                    .map(|(_, status, body)| (*status, *body))
                    .unwrap_or(("404 Not Found", ""));
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        format!("http://{}/content", addr)
    }

    #[tokio::test]
    async fn test_http_source_absent_vs_broken() {
        let base = serve(vec![
            ("/content/programs.json", "200 OK", r#"["infants.json"]"#),
            ("/content/programs/infants.json", "200 OK", "{not json"),
            ("/content/closures.json", "500 Internal Server Error", "oops"),
            ("/content/closures/week%232.json", "200 OK", r#"{"title":"Week 2"}"#),
        ])
        .await;
        let source = HttpSource::new(&base, Duration::from_secs(5)).unwrap();

        assert_eq!(
            source.fetch_json("programs.json").await.unwrap(),
            Some(json!(["infants.json"]))
        );
        assert!(source.fetch_json("documents.json").await.unwrap().is_none());
        assert!(matches!(
            source.fetch_json("closures.json").await,
            Err(TransportError::Status { status: 500, .. })
        ));
        assert!(matches!(
            source.fetch_json("programs/infants.json").await,
            Err(TransportError::InvalidJson { .. })
        ));
        assert_eq!(
            source.fetch_json("closures/week#2.json").await.unwrap(),
            Some(json!({"title": "Week 2"}))
        );
    }
}
