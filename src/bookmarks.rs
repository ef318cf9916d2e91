//! Bookmark descriptor generation (GhostScript pdfmark format).
//!
//! The descriptor is a small PostScript file listing document info plus one
//! `/OUT pdfmark` per chapter and section, each with the 1-based page it
//! starts on. GhostScript reads it alongside the section files during the
//! merge and materialises the entries as PDF bookmarks.
//!
//! The file's existence is this stage's completion marker. An existing
//! descriptor short-circuits the whole stage before any pagination work, so
//! a resumed run makes zero page-count oracle calls.

use std::fmt::Write as _;

use tracing::info;

use crate::error::AssemblyError;
use crate::manual::Manual;
use crate::paginate::{PageCounter, PageTable};
use crate::progress::{ProgressCallback, Stage};
use crate::store::ArtifactStore;

/// Emit the pdfmark descriptor for the manual, unless it already exists.
pub async fn emit<C: PageCounter>(
    manual: &Manual,
    store: &ArtifactStore,
    counter: &C,
    author: Option<&str>,
    progress: &ProgressCallback,
) -> Result<(), AssemblyError> {
    let path = store.pdfmarks_path();
    if path.exists() {
        info!("bookmark descriptor already present, skipping");
        progress.on_stage_start(Stage::Bookmarks, 0);
        progress.on_stage_complete(Stage::Bookmarks);
        return Ok(());
    }

    progress.on_stage_start(Stage::Bookmarks, manual.section_count());

    // Pagination dominates this stage's wall-clock time, so each oracle
    // call advances the progress bar via the decorated counter.
    let reporting = ReportingCounter { counter, progress };
    let table = PageTable::compute(manual, store, &reporting)
        .await
        .map_err(|e| AssemblyError::BookmarkGenerationFailed {
            source: Box::new(e),
        })?;

    let text = render(manual, &table, author)?;

    let dir = store.work_dir();
    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| AssemblyError::io(dir, e))?;
    std::io::Write::write_all(&mut tmp.as_file(), text.as_bytes())
        .map_err(|e| AssemblyError::io(&path, e))?;
    tmp.persist(&path)
        .map_err(|e| AssemblyError::io(&path, e.error))?;

    progress.on_stage_complete(Stage::Bookmarks);
    Ok(())
}

/// Forwards page counts and reports one completed section per call.
///
/// The artifact's file stem is the section's display title, so it doubles
/// as the progress label.
struct ReportingCounter<'a, C> {
    counter: &'a C,
    progress: &'a ProgressCallback,
}

impl<C: PageCounter> PageCounter for ReportingCounter<'_, C> {
    async fn page_count(&self, path: &std::path::Path) -> Result<u32, AssemblyError> {
        let count = self.counter.page_count(path).await?;
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.progress.on_section_complete(Stage::Bookmarks, &title);
        Ok(count)
    }
}

fn render(
    manual: &Manual,
    table: &PageTable,
    author: Option<&str>,
) -> Result<String, AssemblyError> {
    let mut out = String::new();

    write!(out, "[ /Title ({})", escaped(&manual.title)?).ok();
    if let Some(author) = author {
        write!(out, " /Author ({})", escaped(author)?).ok();
    }
    out.push_str(" /DOCINFO pdfmark\n");

    // /Count is emitted even for empty chapters (-0); viewers treat the
    // entry as a childless collapsed node.
    for (chapter, pages) in manual.chapters.iter().zip(&table.chapters) {
        writeln!(
            out,
            "[/Count -{} /Title ({}) /Page {} /OUT pdfmark",
            chapter.sections.len(),
            escaped(&chapter.full_title())?,
            pages.first_page
        )
        .ok();
        for (section, spages) in chapter.sections.iter().zip(&pages.sections) {
            writeln!(
                out,
                "[/Title ({}) /Page {} /OUT pdfmark",
                escaped(&section.full_title(chapter.number))?,
                spages.first_page
            )
            .ok();
        }
    }

    Ok(out)
}

/// Escape a title for a PostScript string literal.
///
/// pdfmark strings are byte-oriented; titles that survived TOC parsing with
/// non-ASCII characters cannot be represented faithfully here and point at
/// garbled upstream TOC text, so they are rejected as a TOC problem rather
/// than silently mojibake'd into the final document.
fn escaped(title: &str) -> Result<String, AssemblyError> {
    if !title.is_ascii() {
        return Err(AssemblyError::MalformedToc {
            reason: format!("title '{title}' contains non-ASCII characters"),
        });
    }
    let mut out = String::with_capacity(title.len());
    for ch in title.chars() {
        if matches!(ch, '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manual::{Chapter, Section};
    use crate::paginate::PageCounter;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use url::Url;

    struct FixedCounter {
        pages: u32,
        calls: AtomicUsize,
    }

    impl PageCounter for FixedCounter {
        async fn page_count(&self, _path: &Path) -> Result<u32, AssemblyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages)
        }
    }

    fn section(number: Option<u32>, title: &str) -> Section {
        Section {
            number,
            title: title.into(),
            url: Url::parse("http://example.com/x.pdf").unwrap(),
        }
    }

    fn manual() -> Manual {
        Manual {
            title: "Aircraft Maintenance Manual".into(),
            chapters: vec![Chapter {
                number: 5,
                title: "Time Limits".into(),
                sections: vec![section(Some(10), "Overview"), section(Some(20), "Inspections")],
            }],
        }
    }

    fn materialize(store: &ArtifactStore, manual: &Manual) {
        for ch in &manual.chapters {
            for s in &ch.sections {
                let p = store.ps_path(ch, s);
                std::fs::create_dir_all(p.parent().unwrap()).unwrap();
                std::fs::write(&p, b"%!PS").unwrap();
            }
        }
    }

    fn noop() -> ProgressCallback {
        Arc::new(crate::progress::NoopProgressCallback)
    }

    #[tokio::test]
    async fn emits_expected_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let m = manual();
        materialize(&store, &m);
        let counter = FixedCounter {
            pages: 3,
            calls: AtomicUsize::new(0),
        };

        emit(&m, &store, &counter, Some("Cirrus Design"), &noop())
            .await
            .unwrap();

        let text = std::fs::read_to_string(store.pdfmarks_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "[ /Title (Aircraft Maintenance Manual) /Author (Cirrus Design) /DOCINFO pdfmark"
        );
        assert_eq!(
            lines[1],
            "[/Count -2 /Title (05 Time Limits) /Page 1 /OUT pdfmark"
        );
        assert_eq!(lines[2], "[/Title (05-10 Overview) /Page 1 /OUT pdfmark");
        assert_eq!(lines[3], "[/Title (05-20 Inspections) /Page 4 /OUT pdfmark");
    }

    #[tokio::test]
    async fn existing_descriptor_short_circuits_the_oracle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let m = manual();
        materialize(&store, &m);
        let counter = FixedCounter {
            pages: 3,
            calls: AtomicUsize::new(0),
        };

        emit(&m, &store, &counter, None, &noop()).await.unwrap();
        let first = std::fs::read_to_string(store.pdfmarks_path()).unwrap();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);

        emit(&m, &store, &counter, None, &noop()).await.unwrap();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2, "no further oracle calls");
        let second = std::fs::read_to_string(store.pdfmarks_path()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn pagination_failure_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let m = manual();
        // No PS artifacts materialized.
        let counter = FixedCounter {
            pages: 3,
            calls: AtomicUsize::new(0),
        };

        let err = emit(&m, &store, &counter, None, &noop()).await.unwrap_err();
        match err {
            AssemblyError::BookmarkGenerationFailed { source } => {
                assert!(matches!(*source, AssemblyError::SectionNotReady { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_ascii_title_is_rejected_as_toc_problem() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut m = manual();
        m.chapters[0].sections[0].title = "Überblick".into();
        materialize(&store, &m);
        let counter = FixedCounter {
            pages: 3,
            calls: AtomicUsize::new(0),
        };

        let err = emit(&m, &store, &counter, None, &noop()).await.unwrap_err();
        assert!(matches!(err, AssemblyError::MalformedToc { .. }));
        assert!(!store.pdfmarks_path().exists());
    }

    #[test]
    fn postscript_specials_are_escaped() {
        assert_eq!(escaped("A (B) C").unwrap(), r"A \(B\) C");
        assert_eq!(escaped(r"back\slash").unwrap(), r"back\\slash");
    }

    #[test]
    fn empty_chapter_gets_count_zero() {
        let m = Manual {
            title: "AMM".into(),
            chapters: vec![Chapter {
                number: 2,
                title: "Reserved".into(),
                sections: vec![],
            }],
        };
        let table = PageTable {
            chapters: vec![crate::paginate::ChapterPages {
                first_page: 1,
                page_count: 0,
                sections: vec![],
            }],
        };
        let text = render(&m, &table, None).unwrap();
        assert!(text.contains("[/Count -0 /Title (02 Reserved) /Page 1 /OUT pdfmark"));
    }

    #[tokio::test]
    async fn pagination_advances_per_section_progress() {
        use crate::progress::AssemblyProgressCallback;

        struct SectionTally {
            completes: AtomicUsize,
        }

        impl AssemblyProgressCallback for SectionTally {
            fn on_section_complete(&self, stage: Stage, _title: &str) {
                assert_eq!(stage, Stage::Bookmarks);
                self.completes.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let m = manual();
        materialize(&store, &m);
        let counter = FixedCounter {
            pages: 3,
            calls: AtomicUsize::new(0),
        };
        let tally = Arc::new(SectionTally {
            completes: AtomicUsize::new(0),
        });
        let progress: ProgressCallback = tally.clone();

        emit(&m, &store, &counter, None, &progress).await.unwrap();
        assert_eq!(tally.completes.load(Ordering::SeqCst), 2);
    }
}
