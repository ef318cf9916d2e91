//! Configuration types for manual assembly.
//!
//! All assembly behaviour is controlled through [`AssemblyConfig`], built via
//! its [`AssemblyConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks, log them, and diff two runs to
//! understand why their outputs differ.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::error::AssemblyError;
use crate::progress::{AssemblyProgressCallback, ProgressCallback};

/// Configuration for one manual assembly run.
///
/// Built via [`AssemblyConfig::builder()`].
///
/// # Example
/// ```rust
/// use manualbind::AssemblyConfig;
/// use url::Url;
///
/// let toc = Url::parse("http://servicecenters.example.com/amm/toc.html").unwrap();
/// let config = AssemblyConfig::builder(toc)
///     .filename("sf50-amm.pdf")
///     .author("Cirrus Design")
///     .skip_unavailable("Log of Temporary Revisions")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AssemblyConfig {
    /// URL of the manual's table-of-contents page.
    pub toc_url: Url,

    /// Working directory holding the snapshot and every intermediate
    /// artifact. Default: `./work`.
    ///
    /// Everything under it is resumable state: deleting a single artifact
    /// makes the next run redo exactly that piece of work.
    pub work_dir: PathBuf,

    /// File name of the final combined PDF, written inside `work_dir`.
    /// Default: `manual.pdf`. Must be a bare file name, not a path.
    pub filename: String,

    /// Optional document author recorded in the bookmark descriptor.
    pub author: Option<String>,

    /// TOC entries whose text starts with this marker belong to the
    /// front-matter chapter (number 0). Default: `"Front Matter"`.
    pub front_matter_marker: String,

    /// Section titles known to 404 on the publisher's site.
    ///
    /// A failed download whose raw title matches one of these exactly is
    /// pruned from the manual instead of failing the run.
    pub skip_unavailable: Vec<String>,

    /// Per-download timeout in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Program name (or path) of the page-count tool. Default: `pdfinfo`.
    pub pdfinfo_program: String,

    /// Program name (or path) of the PDF-to-PostScript converter.
    /// Default: `pdftops`.
    pub pdftops_program: String,

    /// Program name (or path) of the PostScript combiner. Default: `gs`.
    pub ghostscript_program: String,

    /// Optional progress callback receiving per-stage events.
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for AssemblyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyConfig")
            .field("toc_url", &self.toc_url.as_str())
            .field("work_dir", &self.work_dir)
            .field("filename", &self.filename)
            .field("author", &self.author)
            .field("front_matter_marker", &self.front_matter_marker)
            .field("skip_unavailable", &self.skip_unavailable)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("pdfinfo_program", &self.pdfinfo_program)
            .field("pdftops_program", &self.pdftops_program)
            .field("ghostscript_program", &self.ghostscript_program)
            .field(
                "progress",
                &self.progress.as_ref().map(|_| "<dyn AssemblyProgressCallback>"),
            )
            .finish()
    }
}

impl AssemblyConfig {
    /// Create a new builder with the required TOC URL and defaults for
    /// everything else.
    pub fn builder(toc_url: Url) -> AssemblyConfigBuilder {
        AssemblyConfigBuilder {
            config: AssemblyConfig {
                toc_url,
                work_dir: PathBuf::from("work"),
                filename: "manual.pdf".to_string(),
                author: None,
                front_matter_marker: "Front Matter".to_string(),
                skip_unavailable: Vec::new(),
                download_timeout_secs: 120,
                pdfinfo_program: "pdfinfo".to_string(),
                pdftops_program: "pdftops".to_string(),
                ghostscript_program: "gs".to_string(),
                progress: None,
            },
        }
    }

    /// The configured progress callback, or a no-op.
    pub(crate) fn progress(&self) -> ProgressCallback {
        self.progress
            .clone()
            .unwrap_or_else(|| Arc::new(crate::progress::NoopProgressCallback))
    }
}

/// Builder for [`AssemblyConfig`].
pub struct AssemblyConfigBuilder {
    config: AssemblyConfig,
}

impl AssemblyConfigBuilder {
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.config.filename = name.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = Some(author.into());
        self
    }

    pub fn front_matter_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.front_matter_marker = marker.into();
        self
    }

    /// Add one title to the known-unavailable allow-list. Repeatable.
    pub fn skip_unavailable(mut self, title: impl Into<String>) -> Self {
        self.config.skip_unavailable.push(title.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn pdfinfo_program(mut self, program: impl Into<String>) -> Self {
        self.config.pdfinfo_program = program.into();
        self
    }

    pub fn pdftops_program(mut self, program: impl Into<String>) -> Self {
        self.config.pdftops_program = program.into();
        self
    }

    pub fn ghostscript_program(mut self, program: impl Into<String>) -> Self {
        self.config.ghostscript_program = program.into();
        self
    }

    pub fn progress_callback(mut self, callback: Arc<dyn AssemblyProgressCallback>) -> Self {
        self.config.progress = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssemblyConfig, AssemblyError> {
        let c = &self.config;
        if c.filename.is_empty() {
            return Err(AssemblyError::InvalidConfig(
                "output filename must not be empty".into(),
            ));
        }
        if c.filename.contains('/') || c.filename.contains('\\') {
            return Err(AssemblyError::InvalidConfig(format!(
                "output filename must be a bare file name, got '{}'",
                c.filename
            )));
        }
        if c.front_matter_marker.is_empty() {
            return Err(AssemblyError::InvalidConfig(
                "front-matter marker must not be empty".into(),
            ));
        }
        for program in [
            &c.pdfinfo_program,
            &c.pdftops_program,
            &c.ghostscript_program,
        ] {
            if program.is_empty() {
                return Err(AssemblyError::InvalidConfig(
                    "tool program names must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}
