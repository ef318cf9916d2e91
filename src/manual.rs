//! The manual's structural model and its on-disk snapshot.
//!
//! A [`Manual`] is the authoritative record of what the final document will
//! contain: an ordered list of chapters, each an ordered list of sections
//! pointing at the publisher's per-section PDFs. It is built once from the
//! TOC page, persisted to `manual.json` in the working directory, and loaded
//! back on every subsequent run — so the TOC page is only ever fetched on a
//! cold start.
//!
//! Derived page data is intentionally absent from this model; it lives in
//! [`crate::paginate::PageTable`], computed fresh whenever it is needed.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AssemblyError;
use crate::pipeline::toc::TocOutline;

/// The whole manual: title plus ordered chapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manual {
    pub title: String,
    pub chapters: Vec<Chapter>,
}

/// One chapter of the manual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    pub sections: Vec<Section>,
}

/// One section: the unit of download, conversion, and pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section number within the chapter, when the TOC entry carried one.
    /// Front-matter entries like "Record of Revisions" have none.
    pub number: Option<u32>,
    pub title: String,
    /// Absolute URL of the section's PDF on the publisher's site.
    pub url: Url,
}

/// Identity of a section independent of its URL.
///
/// Used for prune bookkeeping across the fetch barrier: the URL is an
/// implementation detail of where the bytes live, not of what the section
/// *is*, so it is excluded from equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionId {
    pub chapter: u32,
    pub number: Option<u32>,
    pub title: String,
}

impl SectionId {
    pub fn of(chapter: &Chapter, section: &Section) -> Self {
        SectionId {
            chapter: chapter.number,
            number: section.number,
            title: section.title.clone(),
        }
    }
}

impl Chapter {
    /// Display title used for bookmarks and artifact directories,
    /// e.g. `"05 Time Limits"`. Zero-padded to keep lexical and numeric
    /// ordering identical.
    pub fn full_title(&self) -> String {
        format!("{:02} {}", self.number, self.title)
    }
}

impl Section {
    /// Display title used for bookmarks and artifact files,
    /// e.g. `"05-10 Overview"` — or the bare title for unnumbered
    /// front-matter sections.
    pub fn full_title(&self, chapter_number: u32) -> String {
        match self.number {
            Some(n) => format!("{:02}-{:02} {}", chapter_number, n, self.title),
            None => self.title.clone(),
        }
    }
}

impl Manual {
    /// Build a manual from a parsed TOC outline.
    ///
    /// Chapter numbering: entries whose text starts with
    /// `front_matter_marker` become chapter 0; entries that parsed an
    /// explicit `"Chapter N"` number use it; anything else gets the previous
    /// chapter's number plus one. The fallback is a heuristic inherited from
    /// the publisher's page format and can mis-number if that format drifts.
    ///
    /// Section hrefs are resolved against `base_url`; an href that cannot
    /// resolve is a [`AssemblyError::MalformedToc`].
    pub fn from_outline(
        outline: &TocOutline,
        base_url: &Url,
        front_matter_marker: &str,
    ) -> Result<Manual, AssemblyError> {
        let mut chapters = Vec::with_capacity(outline.chapters.len());
        let mut previous_number: Option<u32> = None;

        for item in &outline.chapters {
            let number = if item.text.starts_with(front_matter_marker) {
                0
            } else if let Some(n) = item.number {
                n
            } else {
                // 0 stays reserved for front matter: an unnumbered first
                // chapter counts from an implicit previous of 0.
                previous_number.unwrap_or(0) + 1
            };
            previous_number = Some(number);

            let mut sections = Vec::with_capacity(item.sections.len());
            for sec in &item.sections {
                let url = base_url.join(&sec.href).map_err(|e| {
                    AssemblyError::MalformedToc {
                        reason: format!("unresolvable section link '{}': {e}", sec.href),
                    }
                })?;
                sections.push(Section {
                    number: sec.number,
                    title: sec.title.clone(),
                    url,
                });
            }

            chapters.push(Chapter {
                number,
                title: item.title.clone(),
                sections,
            });
        }

        Ok(Manual {
            title: outline.title.clone(),
            chapters,
        })
    }

    /// Load a snapshot.
    ///
    /// Returns `Ok(None)` when the file does not exist (cold start) and
    /// [`AssemblyError::CorruptSnapshot`] when it exists but cannot be
    /// parsed. The distinction matters: an absent snapshot means "build from
    /// the TOC", a corrupt one means "stop before touching the network".
    pub fn load(path: &Path) -> Result<Option<Manual>, AssemblyError> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AssemblyError::io(path, e)),
        };
        let manual =
            serde_json::from_slice(&bytes).map_err(|source| AssemblyError::CorruptSnapshot {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Some(manual))
    }

    /// Persist the snapshot atomically: write to a temp file in the same
    /// directory, then rename over the target. A crash mid-write never
    /// leaves a truncated snapshot behind.
    pub fn persist(&self, path: &Path) -> Result<(), AssemblyError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| AssemblyError::io(dir, e))?;
        serde_json::to_writer_pretty(&tmp, self).map_err(|e| {
            AssemblyError::io(path, std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        tmp.persist(path)
            .map_err(|e| AssemblyError::io(path, e.error))?;
        Ok(())
    }

    /// Remove every section matching the predicate.
    ///
    /// Chapter numbers and the relative order of everything that survives
    /// are untouched; empty chapters are kept (they simply occupy zero
    /// pages). The caller is responsible for re-persisting afterwards.
    pub fn prune_sections(&mut self, mut predicate: impl FnMut(&Chapter, &Section) -> bool) {
        for i in 0..self.chapters.len() {
            let chapter = self.chapters[i].clone();
            self.chapters[i]
                .sections
                .retain(|s| !predicate(&chapter, s));
        }
    }

    /// Total number of sections across all chapters.
    pub fn section_count(&self) -> usize {
        self.chapters.iter().map(|c| c.sections.len()).sum()
    }
}
