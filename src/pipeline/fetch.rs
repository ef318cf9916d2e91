//! Fetch stage: download every section PDF that is not on disk yet.
//!
//! The plan is computed up front (sections whose PDF artifact is missing),
//! then every download runs concurrently with an unbounded fan-out and a
//! single join barrier. A failing download never cancels its siblings:
//! results are collected after the barrier, allow-listed failures are pruned
//! from the manual in one batch, the snapshot is re-persisted, and only then
//! does the first remaining failure surface. That ordering guarantees the
//! next run resumes from maximal progress even when this one fails.

use std::future::Future;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::AssemblyError;
use crate::manual::{Manual, SectionId};
use crate::progress::{ProgressCallback, Stage};
use crate::store::ArtifactStore;

/// Downloads section bytes. The real implementation is HTTP; tests use
/// in-memory maps.
pub trait Fetcher: Send + Sync {
    /// Fetch a page into memory (used for the TOC page only).
    fn fetch_bytes(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<Vec<u8>, AssemblyError>> + Send;

    /// Fetch a document to `dest`. Must be atomic: a torn download must not
    /// leave a file at `dest`.
    fn fetch(
        &self,
        url: &Url,
        dest: &Path,
    ) -> impl Future<Output = Result<(), AssemblyError>> + Send;
}

/// HTTP fetcher backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, AssemblyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                AssemblyError::InvalidConfig(format!("could not construct HTTP client: {e}"))
            })?;
        Ok(HttpFetcher { client })
    }

    async fn get(&self, url: &Url) -> Result<Vec<u8>, AssemblyError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AssemblyError::FetchFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(AssemblyError::FetchFailed {
                url: url.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AssemblyError::FetchFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, AssemblyError> {
        self.get(url).await
    }

    async fn fetch(&self, url: &Url, dest: &Path) -> Result<(), AssemblyError> {
        let bytes = self.get(url).await?;
        // Temp name next to the target, then rename: existence of `dest`
        // is the stage's completion marker, so it must appear all at once.
        let tmp = part_path(dest);
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| AssemblyError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| AssemblyError::io(dest, e))?;
        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

struct PlannedFetch {
    id: SectionId,
    raw_title: String,
    display_title: String,
    url: Url,
    dest: PathBuf,
}

/// Run the fetch stage.
///
/// On return the manual may have been pruned (and re-persisted) if
/// allow-listed sections failed to download.
pub async fn run<F: Fetcher>(
    manual: &mut Manual,
    store: &ArtifactStore,
    fetcher: &F,
    skip_unavailable: &[String],
    progress: &ProgressCallback,
) -> Result<(), AssemblyError> {
    let mut plan = Vec::new();
    for chapter in &manual.chapters {
        for section in &chapter.sections {
            if !store.is_fetched(chapter, section) {
                plan.push(PlannedFetch {
                    id: SectionId::of(chapter, section),
                    raw_title: section.title.clone(),
                    display_title: section.full_title(chapter.number),
                    url: section.url.clone(),
                    dest: store.pdf_path(chapter, section),
                });
            }
        }
    }

    info!(
        pending = plan.len(),
        total = manual.section_count(),
        "fetch stage"
    );
    progress.on_stage_start(Stage::Fetch, plan.len());

    for item in &plan {
        if let Some(parent) = item.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AssemblyError::io(parent, e))?;
        }
    }

    let results = join_all(plan.iter().map(|item| async move {
        debug!(url = %item.url, "downloading");
        fetcher.fetch(&item.url, &item.dest).await
    }))
    .await;

    // Collect after the barrier; only now does the manual get mutated.
    let mut prune: Vec<SectionId> = Vec::new();
    let mut fatal: Option<AssemblyError> = None;
    for (item, result) in plan.iter().zip(results) {
        match result {
            Ok(()) => progress.on_section_complete(Stage::Fetch, &item.display_title),
            Err(e) => {
                progress.on_section_error(Stage::Fetch, &item.display_title, &e);
                if skip_unavailable.iter().any(|t| t == &item.raw_title) {
                    warn!(title = %item.display_title, "known-unavailable section pruned");
                    prune.push(item.id.clone());
                } else if fatal.is_none() {
                    fatal = Some(e);
                }
            }
        }
    }

    if !prune.is_empty() {
        manual.prune_sections(|ch, s| prune.contains(&SectionId::of(ch, s)));
        manual.persist(&store.snapshot_path())?;
    }

    progress.on_stage_complete(Stage::Fetch);
    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manual::{Chapter, Section};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serves any URL not on its failure list; counts every call.
    struct StubFetcher {
        fail: HashSet<String>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn new(fail: &[&str]) -> Self {
            StubFetcher {
                fail: fail.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Fetcher for StubFetcher {
        async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, AssemblyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(url.as_str().as_bytes().to_vec())
        }

        async fn fetch(&self, url: &Url, dest: &Path) -> Result<(), AssemblyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.contains(url.as_str()) {
                return Err(AssemblyError::FetchFailed {
                    url: url.clone(),
                    reason: "HTTP 404 Not Found".into(),
                });
            }
            std::fs::write(dest, b"%PDF-1.4").map_err(|e| AssemblyError::io(dest, e))?;
            Ok(())
        }
    }

    fn url(name: &str) -> Url {
        Url::parse(&format!("http://example.com/amm/{name}")).unwrap()
    }

    fn manual() -> Manual {
        Manual {
            title: "AMM".into(),
            chapters: vec![
                Chapter {
                    number: 0,
                    title: "Front Matter".into(),
                    sections: vec![
                        Section {
                            number: None,
                            title: "Record of Revisions".into(),
                            url: url("rev.pdf"),
                        },
                        Section {
                            number: None,
                            title: "Log of Temporary Revisions".into(),
                            url: url("ltr.pdf"),
                        },
                    ],
                },
                Chapter {
                    number: 5,
                    title: "Time Limits".into(),
                    sections: vec![Section {
                        number: Some(10),
                        title: "Overview".into(),
                        url: url("05-10.pdf"),
                    }],
                },
            ],
        }
    }

    fn noop() -> ProgressCallback {
        Arc::new(crate::progress::NoopProgressCallback)
    }

    #[tokio::test]
    async fn downloads_every_missing_section() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut m = manual();
        let fetcher = StubFetcher::new(&[]);

        run(&mut m, &store, &fetcher, &[], &noop()).await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        for ch in &m.chapters {
            for s in &ch.sections {
                assert!(store.is_fetched(ch, s), "{}", s.title);
            }
        }
    }

    #[tokio::test]
    async fn rerun_on_complete_store_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut m = manual();
        let fetcher = StubFetcher::new(&[]);
        run(&mut m, &store, &fetcher, &[], &noop()).await.unwrap();

        let fetcher2 = StubFetcher::new(&[]);
        run(&mut m, &store, &fetcher2, &[], &noop()).await.unwrap();
        assert_eq!(fetcher2.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn allowlisted_failure_is_pruned_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut m = manual();
        let fetcher = StubFetcher::new(&["http://example.com/amm/ltr.pdf"]);
        let skip = vec!["Log of Temporary Revisions".to_string()];

        run(&mut m, &store, &fetcher, &skip, &noop()).await.unwrap();

        assert_eq!(m.chapters[0].sections.len(), 1);
        assert_eq!(m.chapters[0].sections[0].title, "Record of Revisions");
        // The snapshot on disk reflects the prune.
        let loaded = Manual::load(&store.snapshot_path()).unwrap().unwrap();
        assert_eq!(loaded, m);
    }

    #[tokio::test]
    async fn unlisted_failure_is_fatal_but_siblings_still_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut m = manual();
        let fetcher = StubFetcher::new(&["http://example.com/amm/rev.pdf"]);

        let err = run(&mut m, &store, &fetcher, &[], &noop()).await.unwrap_err();
        assert!(matches!(err, AssemblyError::FetchFailed { .. }));
        // Every other task ran to completion before the error surfaced.
        let ch5 = &m.chapters[1];
        assert!(store.is_fetched(ch5, &ch5.sections[0]));
    }

    #[tokio::test]
    async fn prune_persists_even_when_another_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut m = manual();
        let fetcher = StubFetcher::new(&[
            "http://example.com/amm/ltr.pdf",
            "http://example.com/amm/05-10.pdf",
        ]);
        let skip = vec!["Log of Temporary Revisions".to_string()];

        let err = run(&mut m, &store, &fetcher, &skip, &noop()).await.unwrap_err();
        assert!(matches!(err, AssemblyError::FetchFailed { .. }));
        // The allowlisted prune landed on disk before the error surfaced.
        let loaded = Manual::load(&store.snapshot_path()).unwrap().unwrap();
        assert_eq!(loaded.chapters[0].sections.len(), 1);
    }
}
