//! Deterministic artifact paths under the working directory.
//!
//! Every section maps to exactly one PDF path and one PostScript path,
//! derived from chapter and section display titles. Determinism is what
//! makes the pipeline resumable: a stage decides whether work is done by
//! checking whether the artifact exists, nothing else.
//!
//! Layout:
//!
//! ```text
//! work/
//!   manual.json                     structural snapshot
//!   pdfs/<chapter>/<section>.pdf    fetched originals
//!   ps/<chapter>/<section>.ps       normalized intermediates
//!   pdfmarks                        bookmark descriptor
//!   <filename>                      final combined PDF
//! ```

use std::path::{Path, PathBuf};

use crate::manual::{Chapter, Section};

/// Path policy for one working directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    work_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        ArtifactStore {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.work_dir.join("manual.json")
    }

    pub fn pdfmarks_path(&self) -> PathBuf {
        self.work_dir.join("pdfmarks")
    }

    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.work_dir.join(filename)
    }

    /// Directory holding a chapter's fetched PDFs.
    pub fn pdf_dir(&self, chapter: &Chapter) -> PathBuf {
        self.work_dir.join("pdfs").join(sanitize(&chapter.full_title()))
    }

    /// Directory holding a chapter's normalized PostScript files.
    pub fn ps_dir(&self, chapter: &Chapter) -> PathBuf {
        self.work_dir.join("ps").join(sanitize(&chapter.full_title()))
    }

    /// Path of a section's fetched PDF.
    pub fn pdf_path(&self, chapter: &Chapter, section: &Section) -> PathBuf {
        self.pdf_dir(chapter)
            .join(format!("{}.pdf", sanitize(&section.full_title(chapter.number))))
    }

    /// Path of a section's normalized PostScript artifact.
    pub fn ps_path(&self, chapter: &Chapter, section: &Section) -> PathBuf {
        self.ps_dir(chapter)
            .join(format!("{}.ps", sanitize(&section.full_title(chapter.number))))
    }

    /// Whether the fetch stage has completed this section.
    pub fn is_fetched(&self, chapter: &Chapter, section: &Section) -> bool {
        self.pdf_path(chapter, section).exists()
    }

    /// Whether the normalize stage has completed this section.
    pub fn is_normalized(&self, chapter: &Chapter, section: &Section) -> bool {
        self.ps_path(chapter, section).exists()
    }
}

/// Make a display title safe as a single path component.
///
/// Titles come from the publisher's TOC and occasionally contain `/`
/// (e.g. "Servicing/Lubrication"), which would otherwise split into a
/// subdirectory.
fn sanitize(title: &str) -> String {
    title.replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn chapter() -> Chapter {
        Chapter {
            number: 12,
            title: "Servicing".into(),
            sections: vec![],
        }
    }

    fn section(number: Option<u32>, title: &str) -> Section {
        Section {
            number,
            title: title.into(),
            url: Url::parse("http://example.com/x.pdf").unwrap(),
        }
    }

    #[test]
    fn paths_are_deterministic_and_distinct() {
        let store = ArtifactStore::new("work");
        let ch = chapter();
        let s = section(Some(10), "Replenishing");
        assert_eq!(
            store.pdf_path(&ch, &s),
            PathBuf::from("work/pdfs/12 Servicing/12-10 Replenishing.pdf")
        );
        assert_eq!(
            store.ps_path(&ch, &s),
            PathBuf::from("work/ps/12 Servicing/12-10 Replenishing.ps")
        );
    }

    #[test]
    fn slashes_in_titles_are_sanitized() {
        let store = ArtifactStore::new("work");
        let ch = chapter();
        let s = section(Some(20), "Servicing/Lubrication");
        let path = store.pdf_path(&ch, &s);
        assert!(path.ends_with("12-20 Servicing-Lubrication.pdf"), "{path:?}");
    }

    #[test]
    fn unnumbered_sections_use_bare_title() {
        let store = ArtifactStore::new("work");
        let ch = Chapter {
            number: 0,
            title: "Front Matter".into(),
            sections: vec![],
        };
        let s = section(None, "Record of Revisions");
        assert!(store
            .pdf_path(&ch, &s)
            .ends_with("00 Front Matter/Record of Revisions.pdf"));
    }

    #[test]
    fn existence_checks_track_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let ch = chapter();
        let s = section(Some(10), "Replenishing");
        assert!(!store.is_fetched(&ch, &s));

        let path = store.pdf_path(&ch, &s);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        assert!(store.is_fetched(&ch, &s));
        assert!(!store.is_normalized(&ch, &s));
    }
}
