//! Error types for the manualbind library.
//!
//! One flat enum covers the whole pipeline. Every failure here is fatal to
//! the current run: the system deliberately has no in-process retries, since
//! re-running the pipeline over the same working directory resumes from
//! whatever artifacts already exist. Error messages carry the operator's
//! next step inline, because the only recovery path is a human deciding
//! which file to delete before re-running.

use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// All errors returned by the manualbind library.
#[derive(Debug, Error)]
pub enum AssemblyError {
    // ── TOC errors ────────────────────────────────────────────────────────
    /// The table-of-contents page had an unexpected structure.
    #[error(
        "table of contents page could not be parsed: {reason}\n\
         Verify the URL points at the TOC frame itself, not the manual's \
         landing page. If it does, the site layout may have changed."
    )]
    MalformedToc { reason: String },

    /// A snapshot file exists but cannot be deserialised.
    #[error(
        "saved manual snapshot '{path}' is unreadable\n\
         Delete the file and re-run to rebuild it from the TOC."
    )]
    CorruptSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// A section download failed and its title is not on the
    /// known-unavailable allow-list.
    #[error(
        "failed to download '{url}': {reason}\n\
         Check that the site is reachable; re-running resumes from the \
         sections already on disk."
    )]
    FetchFailed { url: Url, reason: String },

    /// The external converter could not turn a downloaded section into the
    /// metadata-stripped intermediate form.
    #[error(
        "failed to convert '{path}' to PostScript\n\
         The downloaded file may be corrupt: delete it and re-run, or \
         update pdftops."
    )]
    ConversionFailed { path: PathBuf },

    /// The page-count oracle could not read a normalized artifact.
    #[error(
        "could not read a page count from '{path}'\n\
         Delete the file and re-run, or update pdfinfo."
    )]
    CouldNotParseDocument { path: PathBuf },

    /// The external combiner exited non-zero.
    #[error(
        "combining the PostScript files failed: {detail}\n\
         Check the files under the working directory's ps/ tree, or update \
         GhostScript."
    )]
    MergeFailed { detail: String },

    /// A page computation failed while generating the bookmark descriptor.
    #[error("bookmark generation failed")]
    BookmarkGenerationFailed {
        #[source]
        source: Box<AssemblyError>,
    },

    /// Pagination was requested for a section whose normalized artifact does
    /// not exist yet. Correct stage ordering makes this unreachable; seeing
    /// it means an internal invariant broke, not operator error.
    #[error("section '{title}' has no normalized artifact yet")]
    SectionNotReady { title: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A filesystem read or write under the working directory failed.
    #[error("i/o failure on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AssemblyError {
    /// Wrap an `io::Error` with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssemblyError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failed_display_names_url() {
        let e = AssemblyError::FetchFailed {
            url: Url::parse("http://example.com/amm/05-10.pdf").unwrap(),
            reason: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("05-10.pdf"), "got: {msg}");
        assert!(msg.contains("HTTP 503"));
    }

    #[test]
    fn bookmark_failure_carries_source() {
        use std::error::Error as _;
        let e = AssemblyError::BookmarkGenerationFailed {
            source: Box::new(AssemblyError::SectionNotReady {
                title: "Overview".into(),
            }),
        };
        let src = e.source().expect("must have a source");
        assert!(src.to_string().contains("Overview"));
    }

    #[test]
    fn corrupt_snapshot_mentions_delete_hint() {
        let bad: serde_json::Error = serde_json::from_str::<u32>("{").unwrap_err();
        let e = AssemblyError::CorruptSnapshot {
            path: PathBuf::from("work/manual.json"),
            source: bad,
        };
        assert!(e.to_string().contains("Delete the file"));
    }
}
