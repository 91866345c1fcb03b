//! # Daycare Content
//!
//! Content pipeline for a childcare center's website.
//!
//! Content editors keep one JSON file per item in four buckets (programs,
//! closures, documents, information). At build time the [`indexer`] writes a
//! sorted manifest per bucket and publishes the documents next to it. At
//! load time the [`aggregate`] loader reads the manifests and documents
//! through a [`source::ContentSource`], decodes typed records and derives the
//! view state the pages render: capacity bars, status badges, upcoming and
//! past closures.
//!
//! ## Architecture
//!
//! ```text
//! src/content/<bucket>/*.json
//!          │
//!          ▼
//!   ┌─────────────┐   public/content/<bucket>.json   ┌────────────┐
//!   │   Indexer   │─────────────────────────────────▶│  Loader    │
//!   │ list + copy │   public/content/<bucket>/*.json │ dir / http │
//!   └─────────────┘                                  └─────┬──────┘
//!                                                          ▼
//!                                                    ┌────────────┐
//!                                                    │  derive    │
//!                                                    │ view state │
//!                                                    └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dcx index                     # write manifests, publish documents
//! dcx buckets                   # check manifests against sources
//! dcx load closures             # print derived closures view
//! dcx export --output dist/site-content.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Buckets and record types |
//! | [`error`] | Per-bucket error taxonomy |
//! | [`indexer`] | Manifest generation and publishing |
//! | [`source`] | Directory, HTTP and in-memory transports |
//! | [`aggregate`] | Bucket loading and site aggregation |
//! | [`derive`] | Capacity, status and closure view state |
//! | [`format`] | Currency and date display |
//! | [`export`] | Site bundle for build-time embedding |
//! | [`buckets`] | Bucket status overview |

pub mod aggregate;
pub mod buckets;
pub mod config;
pub mod derive;
pub mod error;
pub mod export;
pub mod format;
pub mod indexer;
pub mod models;
pub mod source;
