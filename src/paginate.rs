//! Pagination: where each chapter and section starts in the final document.
//!
//! Page positions are pure derived data. They are never stored on the
//! [`crate::manual::Manual`] model or in the snapshot; instead a
//! [`PageTable`] is computed in a single left-to-right pass whenever the
//! bookmark stage needs one, asking the page-count oracle exactly once per
//! section. First pages fall out as a prefix sum: the first chapter starts
//! at page 1, and every later position is "previous start + previous size".

use std::future::Future;
use std::path::Path;

use crate::error::AssemblyError;
use crate::manual::Manual;
use crate::store::ArtifactStore;

/// Page-count oracle over normalized artifacts.
///
/// The real implementation shells out to `pdfinfo`
/// ([`crate::pipeline::oracle::PdfinfoCounter`]); tests substitute fixed
/// tables.
pub trait PageCounter: Send + Sync {
    fn page_count(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<u32, AssemblyError>> + Send;
}

/// Page positions of one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionPages {
    pub first_page: u32,
    pub page_count: u32,
}

/// Page positions of one chapter plus its sections, in manual order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPages {
    pub first_page: u32,
    pub page_count: u32,
    pub sections: Vec<SectionPages>,
}

/// Immutable pagination side table, parallel to the manual's chapter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    pub chapters: Vec<ChapterPages>,
}

impl PageTable {
    /// Compute the table in one pass over the manual.
    ///
    /// Every section's normalized artifact must already exist
    /// ([`AssemblyError::SectionNotReady`] otherwise); the oracle is invoked
    /// exactly once per section. An empty chapter occupies zero pages, so
    /// its first page coincides with the next chapter's.
    pub async fn compute<C: PageCounter>(
        manual: &Manual,
        store: &ArtifactStore,
        counter: &C,
    ) -> Result<PageTable, AssemblyError> {
        let mut chapters = Vec::with_capacity(manual.chapters.len());
        let mut cursor: u32 = 1;

        for chapter in &manual.chapters {
            let chapter_first = cursor;
            let mut sections = Vec::with_capacity(chapter.sections.len());

            for section in &chapter.sections {
                let path = store.ps_path(chapter, section);
                if !path.exists() {
                    return Err(AssemblyError::SectionNotReady {
                        title: section.full_title(chapter.number),
                    });
                }
                let count = counter.page_count(&path).await?;
                sections.push(SectionPages {
                    first_page: cursor,
                    page_count: count,
                });
                cursor += count;
            }

            chapters.push(ChapterPages {
                first_page: chapter_first,
                page_count: cursor - chapter_first,
                sections,
            });
        }

        Ok(PageTable { chapters })
    }

    /// Total pages across the whole document.
    pub fn total_pages(&self) -> u32 {
        self.chapters.iter().map(|c| c.page_count).sum()
    }
}
