//! Build-time manifest generation.
//!
//! For each bucket the indexer lists the `.json` files directly inside
//! `<source_root>/<bucket>/`, sorts them by byte order, optionally copies
//! them to `<publish_root>/<bucket>/`, and finally writes the sorted list
//! to `<publish_root>/<bucket>.json`.
//!
//! A missing bucket directory yields an empty manifest. Any other
//! filesystem failure aborts that bucket only: its manifest is left as it
//! was, and the remaining buckets are still processed.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{ContentError, ContentResult};
use crate::models::Bucket;

/// Result of indexing one bucket.
#[derive(Debug, Clone)]
pub struct BucketIndex {
    pub bucket: Bucket,
    /// Manifest entries, sorted.
    pub files: Vec<String>,
    /// Documents copied to the publish directory.
    pub copied: usize,
    /// Documents already published with identical content.
    pub unchanged: usize,
    pub manifest: PathBuf,
}

/// Outcome of an indexing run over several buckets.
#[derive(Debug)]
pub struct IndexReport {
    pub results: Vec<(Bucket, ContentResult<BucketIndex>)>,
}

impl IndexReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ContentError> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().err())
    }
}

pub struct Indexer {
    source_root: PathBuf,
    publish_root: PathBuf,
    publish: bool,
    matcher: GlobMatcher,
}

impl Indexer {
    pub fn new(source_root: impl Into<PathBuf>, publish_root: impl Into<PathBuf>) -> Result<Self> {
        let matcher = GlobBuilder::new("*.json")
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .context("Failed to compile document pattern")?
            .compile_matcher();

        Ok(Self {
            source_root: source_root.into(),
            publish_root: publish_root.into(),
            publish: true,
            matcher,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(&config.content.source_root, &config.content.publish_root)?
            .with_publish(config.index.publish))
    }

    /// Enable or disable copying documents into the publish tree.
    pub fn with_publish(mut self, publish: bool) -> Self {
        self.publish = publish;
        self
    }

    pub fn source_dir(&self, bucket: Bucket) -> PathBuf {
        self.source_root.join(bucket.as_str())
    }

    pub fn publish_dir(&self, bucket: Bucket) -> PathBuf {
        self.publish_root.join(bucket.as_str())
    }

    /// Directory the manifests go to: the publish tree when publishing,
    /// otherwise the source tree, which then holds manifests and documents.
    pub fn manifest_root(&self) -> &Path {
        if self.publish {
            &self.publish_root
        } else {
            &self.source_root
        }
    }

    pub fn manifest_path(&self, bucket: Bucket) -> PathBuf {
        self.manifest_root().join(bucket.manifest_name())
    }

    /// List the document file names of a bucket, sorted by byte order.
    ///
    /// Only regular files (or symlinks to them) directly inside the bucket
    /// directory count. A missing directory is an empty bucket.
    pub fn list_documents(&self, bucket: Bucket) -> ContentResult<Vec<String>> {
        let dir = self.source_dir(bucket);
        let read_failed = |source: io::Error| ContentError::FilesystemReadFailed {
            bucket,
            path: dir.clone(),
            source,
        };

        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(read_failed(io::Error::other("not a directory")));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(
                    %bucket,
                    dir = %dir.display(),
                    "bucket directory missing, treating as empty"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(read_failed(e)),
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true);
        for entry in walker {
            let entry = entry.map_err(|e| read_failed(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                tracing::warn!(
                    %bucket,
                    file = %entry.file_name().to_string_lossy(),
                    "skipping file with non UTF-8 name"
                );
                continue;
            };

            if self.matcher.is_match(name) {
                files.push(name.to_string());
            }
        }

        // Byte order, independent of locale and directory iteration order
        files.sort();
        Ok(files)
    }

    /// Index one bucket: list, publish (if enabled), then write the manifest.
    pub fn build_index(&self, bucket: Bucket) -> ContentResult<BucketIndex> {
        let files = self.list_documents(bucket)?;

        ensure_dir(bucket, self.manifest_root())?;

        let mut copied = 0;
        let mut unchanged = 0;
        if self.publish {
            let src_dir = self.source_dir(bucket);
            let pub_dir = self.publish_dir(bucket);
            ensure_dir(bucket, &pub_dir)?;

            for file in &files {
                if publish_file(bucket, &src_dir.join(file), &pub_dir.join(file))? {
                    copied += 1;
                } else {
                    unchanged += 1;
                }
            }
        }

        let manifest = self.manifest_path(bucket);
        write_manifest(bucket, &manifest, &files)?;

        tracing::info!(%bucket, items = files.len(), copied, unchanged, "index written");
        Ok(BucketIndex {
            bucket,
            files,
            copied,
            unchanged,
            manifest,
        })
    }

    /// Index every given bucket, continuing past failures.
    pub fn index_all(&self, buckets: &[Bucket]) -> IndexReport {
        let results = buckets
            .iter()
            .map(|&bucket| {
                let result = self.build_index(bucket);
                if let Err(e) = &result {
                    tracing::warn!(%bucket, error = %e, "bucket indexing failed");
                }
                (bucket, result)
            })
            .collect();
        IndexReport { results }
    }
}

fn ensure_dir(bucket: Bucket, dir: &Path) -> ContentResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| ContentError::FilesystemWriteFailed {
        bucket,
        op: "create directory",
        path: dir.to_path_buf(),
        source,
    })
}

/// Copy `src` to `dst` unless `dst` already holds identical bytes.
/// Returns whether a copy happened.
fn publish_file(bucket: Bucket, src: &Path, dst: &Path) -> ContentResult<bool> {
    let copy_failed = |source: io::Error| ContentError::FilesystemWriteFailed {
        bucket,
        op: "copy",
        path: dst.to_path_buf(),
        source,
    };

    let src_bytes = std::fs::read(src).map_err(|source| ContentError::FilesystemReadFailed {
        bucket,
        path: src.to_path_buf(),
        source,
    })?;

    match std::fs::read(dst) {
        Ok(existing) if Sha256::digest(&existing) == Sha256::digest(&src_bytes) => {
            return Ok(false);
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(copy_failed(e)),
    }

    std::fs::write(dst, &src_bytes).map_err(copy_failed)?;
    Ok(true)
}

/// Write the manifest through a temp file so readers never see a partial one.
fn write_manifest(bucket: Bucket, path: &Path, files: &[String]) -> ContentResult<()> {
    let write_failed = |source: io::Error| ContentError::FilesystemWriteFailed {
        bucket,
        op: "write manifest",
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(files).map_err(|e| write_failed(e.into()))?;
    let tmp = path.with_file_name(format!(".{}.tmp", bucket.manifest_name()));
    std::fs::write(&tmp, json.as_bytes()).map_err(write_failed)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_failed(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Indexer) {
        let tmp = TempDir::new().unwrap();
        let indexer = Indexer::new(tmp.path().join("src"), tmp.path().join("public")).unwrap();
        (tmp, indexer)
    }

    fn add_file(tmp: &TempDir, bucket: Bucket, name: &str, body: &str) {
        let dir = tmp.path().join("src").join(bucket.as_str());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), body).unwrap();
    }

    fn read_manifest(indexer: &Indexer, bucket: Bucket) -> Vec<String> {
        let raw = fs::read_to_string(indexer.manifest_path(bucket)).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_sorts_byte_order() {
        let (tmp, indexer) = setup();
        for name in ["b.json", "A.json", "a.json"] {
            add_file(&tmp, Bucket::Programs, name, "{}");
        }

        indexer.build_index(Bucket::Programs).unwrap();
        assert_eq!(
            read_manifest(&indexer, Bucket::Programs),
            vec!["A.json", "a.json", "b.json"]
        );
    }

    #[test]
    fn test_missing_directory_writes_empty_manifest() {
        let (_tmp, indexer) = setup();
        let index = indexer.build_index(Bucket::Closures).unwrap();
        assert!(index.files.is_empty());
        assert_eq!(
            fs::read_to_string(indexer.manifest_path(Bucket::Closures)).unwrap(),
            "[]"
        );
    }

    #[test]
    fn test_filters_json_case_insensitive() {
        let (tmp, indexer) = setup();
        add_file(&tmp, Bucket::Documents, "handbook.json", "{}");
        add_file(&tmp, Bucket::Documents, "FORMS.JSON", "{}");
        add_file(&tmp, Bucket::Documents, "notes.txt", "x");
        add_file(&tmp, Bucket::Documents, "draft.json.bak", "{}");
        fs::create_dir_all(tmp.path().join("src/documents/nested.json")).unwrap();

        let files = indexer.list_documents(Bucket::Documents).unwrap();
        assert_eq!(files, vec!["FORMS.JSON", "handbook.json"]);
    }

    #[test]
    fn test_manifest_matches_directory() {
        let (tmp, indexer) = setup();
        let names = ["winter.json", "summer.json", "labor-day.json"];
        for name in names {
            add_file(&tmp, Bucket::Closures, name, "{}");
        }

        indexer.build_index(Bucket::Closures).unwrap();
        let mut expected: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(read_manifest(&indexer, Bucket::Closures), expected);
    }

    #[test]
    fn test_deterministic_and_idempotent_publish() {
        let (tmp, indexer) = setup();
        add_file(&tmp, Bucket::Programs, "infants.json", r#"{"title":"Infants"}"#);
        add_file(&tmp, Bucket::Programs, "toddlers.json", r#"{"title":"Toddlers"}"#);

        let first = indexer.build_index(Bucket::Programs).unwrap();
        assert_eq!(first.copied, 2);
        let manifest_1 = fs::read(indexer.manifest_path(Bucket::Programs)).unwrap();

        let second = indexer.build_index(Bucket::Programs).unwrap();
        assert_eq!(second.copied, 0);
        assert_eq!(second.unchanged, 2);
        let manifest_2 = fs::read(indexer.manifest_path(Bucket::Programs)).unwrap();
        assert_eq!(manifest_1, manifest_2);

        let published = fs::read_to_string(tmp.path().join("public/programs/infants.json")).unwrap();
        assert_eq!(published, r#"{"title":"Infants"}"#);
        let entries = fs::read_dir(tmp.path().join("public/programs")).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn test_publish_overwrites_changed_document() {
        let (tmp, indexer) = setup();
        add_file(&tmp, Bucket::Information, "hours.json", r#"{"title":"Old"}"#);
        indexer.build_index(Bucket::Information).unwrap();

        add_file(&tmp, Bucket::Information, "hours.json", r#"{"title":"New"}"#);
        let index = indexer.build_index(Bucket::Information).unwrap();
        assert_eq!(index.copied, 1);
        let published =
            fs::read_to_string(tmp.path().join("public/information/hours.json")).unwrap();
        assert_eq!(published, r#"{"title":"New"}"#);
    }

    #[test]
    fn test_no_publish_writes_manifest_only() {
        let (tmp, indexer) = setup();
        let indexer = indexer.with_publish(false);
        add_file(&tmp, Bucket::Programs, "infants.json", "{}");

        let index = indexer.build_index(Bucket::Programs).unwrap();
        assert_eq!(index.files, vec!["infants.json"]);
        assert_eq!(index.manifest, tmp.path().join("src/programs.json"));
        assert!(index.manifest.exists());
        assert!(!tmp.path().join("public").exists());
    }

    #[tokio::test]
    async fn test_no_publish_source_tree_is_loadable() {
        use crate::aggregate::Loader;
        use crate::models::Program;
        use crate::source::DirSource;

        let (tmp, indexer) = setup();
        let indexer = indexer.with_publish(false);
        // A stale copy from an earlier publish run must not be read
        fs::create_dir_all(tmp.path().join("public/programs")).unwrap();
        fs::write(tmp.path().join("public/programs.json"), r#"["old.json"]"#).unwrap();
        add_file(
            &tmp,
            Bucket::Programs,
            "infants.json",
            r#"{
                "title": "Infants", "age_range": "0-1", "description": "d", "ratio": "1:4",
                "tuition": {"full_time": 1650},
                "availability": {"status": "Full", "max_capacity": 8, "enrolled": 8}
            }"#,
        );

        indexer.build_index(Bucket::Programs).unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("public/programs.json")).unwrap(),
            r#"["old.json"]"#
        );

        let source = DirSource::new(indexer.manifest_root());
        let programs = Loader::new(&source).load_bucket::<Program>().await.unwrap();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].title, "Infants");
    }

    #[test]
    fn test_failed_manifest_write_leaves_no_temp_file() {
        let (tmp, indexer) = setup();
        add_file(&tmp, Bucket::Programs, "infants.json", "{}");
        // A non-empty directory where the manifest should go makes the rename fail
        fs::create_dir_all(tmp.path().join("public/programs.json/blocker")).unwrap();

        let err = indexer.build_index(Bucket::Programs).unwrap_err();
        assert!(matches!(
            err,
            ContentError::FilesystemWriteFailed { op: "write manifest", .. }
        ));
        assert!(!tmp.path().join("public/.programs.json.tmp").exists());
    }

    #[test]
    fn test_failed_bucket_does_not_stop_others() {
        let (tmp, indexer) = setup();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        // A file where the bucket directory should be
        fs::write(tmp.path().join("src/closures"), "oops").unwrap();
        add_file(&tmp, Bucket::Programs, "infants.json", "{}");

        let report = indexer.index_all(&Bucket::ALL);
        assert!(!report.is_success());
        let failed: Vec<Bucket> = report.failures().map(|e| e.bucket()).collect();
        assert_eq!(failed, vec![Bucket::Closures]);

        assert!(!indexer.manifest_path(Bucket::Closures).exists());
        assert_eq!(read_manifest(&indexer, Bucket::Programs), vec!["infants.json"]);
        assert_eq!(read_manifest(&indexer, Bucket::Documents), Vec::<String>::new());
    }
}
