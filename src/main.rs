//! # Daycare Content CLI (`dcx`)
//!
//! Builds content manifests and inspects the derived view state.
//!
//! ## Usage
//!
//! ```bash
//! dcx --config ./config/dcx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dcx index` | Write per-bucket manifests and publish documents |
//! | `dcx buckets` | Show source and manifest status per bucket |
//! | `dcx load <bucket>` | Load one bucket and print its derived view |
//! | `dcx export` | Load all buckets and write the site bundle |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `daycare_content=info`).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use daycare_content::aggregate::Loader;
use daycare_content::format::{parse_date, Formatter};
use daycare_content::indexer::Indexer;
use daycare_content::models::Bucket;
use daycare_content::{buckets, config, export, source};

/// Content pipeline for the center's website.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dcx.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "dcx", version, about = "Index and load website content buckets")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dcx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write manifests for every bucket.
    ///
    /// Lists the JSON documents of each bucket, copies them to the publish
    /// directory and writes `<bucket>.json`. Buckets are processed
    /// independently; the command fails if any bucket failed.
    Index {
        /// Write manifests only, without copying documents.
        #[arg(long)]
        no_publish: bool,

        /// Index a single bucket (programs, closures, documents, information).
        #[arg(long)]
        bucket: Option<Bucket>,
    },

    /// Show source directory and manifest status for each bucket.
    Buckets,

    /// Load one bucket and print its derived view as JSON.
    Load {
        bucket: Bucket,

        /// Reference time for upcoming/past closures (YYYY-MM-DD or RFC 3339).
        #[arg(long, value_parser = parse_now)]
        now: Option<DateTime<Utc>>,
    },

    /// Load all buckets and export the derived site bundle as JSON.
    Export {
        /// Output file. Prints to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Reference time for upcoming/past closures (YYYY-MM-DD or RFC 3339).
        #[arg(long, value_parser = parse_now)]
        now: Option<DateTime<Utc>>,
    },
}

fn parse_now(s: &str) -> Result<DateTime<Utc>, String> {
    parse_date(s)
        .map(|d| d.start())
        .ok_or_else(|| format!("invalid date '{}': expected YYYY-MM-DD or RFC 3339", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daycare_content=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { no_publish, bucket } => {
            let indexer =
                Indexer::from_config(&cfg)?.with_publish(cfg.index.publish && !no_publish);
            let targets = match bucket {
                Some(b) => vec![b],
                None => Bucket::ALL.to_vec(),
            };

            let report = indexer.index_all(&targets);
            for (bucket, result) in &report.results {
                match result {
                    Ok(index) => println!(
                        "✓ {}: {} items, index written ({} copied, {} unchanged)",
                        bucket,
                        index.files.len(),
                        index.copied,
                        index.unchanged
                    ),
                    Err(e) => println!("✗ {}: {}", bucket, e),
                }
            }

            let failed = report.failures().count();
            if failed > 0 {
                bail!("{} of {} buckets failed to index", failed, targets.len());
            }
        }
        Commands::Buckets => {
            buckets::list_buckets(&cfg)?;
        }
        Commands::Load { bucket, now } => {
            let source = source::from_config(&cfg.loader)?;
            let loader = Loader::from_config(source.as_ref(), &cfg.loader);
            let fmt = Formatter::new(&cfg.display);

            let view = loader
                .load_view(bucket, now.unwrap_or_else(Utc::now), &fmt)
                .await
                .with_context(|| format!("Could not load {}", bucket))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Export { output, now } => {
            export::run_export(&cfg, output.as_deref(), now.unwrap_or_else(Utc::now)).await?;
        }
    }

    Ok(())
}
