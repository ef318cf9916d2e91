//! Top-level orchestration: run the whole pipeline over one working
//! directory.
//!
//! Stage order is strict — snapshot, fetch, normalize, bookmarks, merge —
//! and each stage trusts the previous one's completion markers rather than
//! re-verifying its inputs. [`assemble`] wires the real external tools;
//! [`assemble_with`] accepts any [`Toolchain`], which is how the tests drive
//! the pipeline without a network or the poppler/GhostScript binaries.

use std::path::PathBuf;

use tracing::info;

use crate::bookmarks;
use crate::config::AssemblyConfig;
use crate::error::AssemblyError;
use crate::manual::Manual;
use crate::paginate::PageCounter;
use crate::pipeline::fetch::{self, Fetcher, HttpFetcher};
use crate::pipeline::merge::{self, Combiner, GhostscriptCombiner};
use crate::pipeline::normalize::{self, Converter, PdftopsConverter};
use crate::pipeline::oracle::PdfinfoCounter;
use crate::pipeline::toc::{HtmlTocExtractor, TocExtractor};
use crate::store::ArtifactStore;

/// The pipeline's five external seams, bundled.
pub struct Toolchain<T, F, C, P, M> {
    pub toc: T,
    pub fetcher: F,
    pub converter: C,
    pub counter: P,
    pub combiner: M,
}

/// The production toolchain: HTTP plus the poppler and GhostScript tools.
pub type DefaultToolchain =
    Toolchain<HtmlTocExtractor, HttpFetcher, PdftopsConverter, PdfinfoCounter, GhostscriptCombiner>;

impl DefaultToolchain {
    pub fn from_config(config: &AssemblyConfig) -> Result<Self, AssemblyError> {
        Ok(Toolchain {
            toc: HtmlTocExtractor,
            fetcher: HttpFetcher::new(config.download_timeout_secs)?,
            converter: PdftopsConverter::new(&config.pdftops_program),
            counter: PdfinfoCounter::new(&config.pdfinfo_program),
            combiner: GhostscriptCombiner::new(&config.ghostscript_program),
        })
    }
}

/// Assemble the manual with the production toolchain.
///
/// Returns the path of the combined PDF inside the working directory.
pub async fn assemble(config: &AssemblyConfig) -> Result<PathBuf, AssemblyError> {
    let toolchain = DefaultToolchain::from_config(config)?;
    assemble_with(config, &toolchain).await
}

/// Assemble the manual with a caller-supplied toolchain.
pub async fn assemble_with<T, F, C, P, M>(
    config: &AssemblyConfig,
    toolchain: &Toolchain<T, F, C, P, M>,
) -> Result<PathBuf, AssemblyError>
where
    T: TocExtractor,
    F: Fetcher,
    C: Converter,
    P: PageCounter,
    M: Combiner,
{
    let store = ArtifactStore::new(&config.work_dir);
    std::fs::create_dir_all(store.work_dir())
        .map_err(|e| AssemblyError::io(store.work_dir(), e))?;
    let progress = config.progress();

    // The snapshot is consulted before anything else: a corrupt one halts
    // the run before a single network request.
    let mut manual = match Manual::load(&store.snapshot_path())? {
        Some(manual) => {
            info!(title = %manual.title, "resuming from snapshot");
            manual
        }
        None => {
            info!(url = %config.toc_url, "building manual from TOC");
            let bytes = toolchain.fetcher.fetch_bytes(&config.toc_url).await?;
            let outline = toolchain.toc.extract(&bytes)?;
            let manual =
                Manual::from_outline(&outline, &config.toc_url, &config.front_matter_marker)?;
            manual.persist(&store.snapshot_path())?;
            manual
        }
    };

    fetch::run(
        &mut manual,
        &store,
        &toolchain.fetcher,
        &config.skip_unavailable,
        &progress,
    )
    .await?;
    normalize::run(&manual, &store, &toolchain.converter, &progress).await?;
    bookmarks::emit(
        &manual,
        &store,
        &toolchain.counter,
        config.author.as_deref(),
        &progress,
    )
    .await?;
    let output = merge::run(
        &manual,
        &store,
        &toolchain.combiner,
        &config.filename,
        &progress,
    )
    .await?;

    info!(output = %output.display(), "assembly complete");
    Ok(output)
}
