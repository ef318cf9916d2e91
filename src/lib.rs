//! # manualbind
//!
//! Assemble a multi-part technical manual — published as one PDF per
//! section on the manufacturer's site — into a single combined PDF with
//! page-accurate table-of-contents bookmarks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! TOC page
//!  │
//!  ├─ 1. Snapshot   parse the TOC once, persist manual.json
//!  ├─ 2. Fetch      download each missing section PDF (concurrent)
//!  ├─ 3. Normalize  pdftops each PDF to metadata-free PostScript
//!  ├─ 4. Bookmarks  pdfinfo page counts → prefix sums → pdfmarks file
//!  └─ 5. Merge      gs combines every .ps + pdfmarks into one PDF
//! ```
//!
//! Every stage is resumable: completion is tracked by artifact existence in
//! the working directory, so re-running after a failure redoes only the
//! missing pieces, and there are no in-process retries anywhere.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manualbind::{assemble, AssemblyConfig};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let toc = Url::parse("http://servicecenters.example.com/amm/toc.html")?;
//!     let config = AssemblyConfig::builder(toc)
//!         .author("Cirrus Design")
//!         .skip_unavailable("Log of Temporary Revisions")
//!         .build()?;
//!     let output = assemble(&config).await?;
//!     println!("{}", output.display());
//!     Ok(())
//! }
//! ```
//!
//! Requires `pdfinfo` and `pdftops` (poppler) plus `gs` (GhostScript) on
//! the PATH; the program names are configurable for non-standard installs.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `manualbind` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! manualbind = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod bookmarks;
pub mod config;
pub mod error;
pub mod manual;
pub mod paginate;
pub mod pipeline;
pub mod progress;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{assemble, assemble_with, DefaultToolchain, Toolchain};
pub use config::{AssemblyConfig, AssemblyConfigBuilder};
pub use error::AssemblyError;
pub use manual::{Chapter, Manual, Section, SectionId};
pub use paginate::{PageCounter, PageTable};
pub use progress::{AssemblyProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use store::ArtifactStore;
