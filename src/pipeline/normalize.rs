//! Normalize stage: convert each downloaded PDF into plain PostScript.
//!
//! The publisher's per-section PDFs carry metadata and structure that makes
//! the final combination step unreliable; round-tripping every section
//! through PostScript strips all of it. The stage has the same shape as
//! fetch — plan missing artifacts, unbounded fan-out, join barrier — but no
//! allow-list: a conversion failure is always fatal, because the input is
//! already on disk and retrying without operator intervention cannot help.

use std::future::Future;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use tracing::{debug, info};

use crate::error::AssemblyError;
use crate::manual::Manual;
use crate::progress::{ProgressCallback, Stage};
use crate::store::ArtifactStore;

/// Converts one downloaded section into the intermediate form.
pub trait Converter: Send + Sync {
    fn to_intermediate(
        &self,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<(), AssemblyError>> + Send;
}

/// The real converter, shelling out to `pdftops`.
#[derive(Debug, Clone)]
pub struct PdftopsConverter {
    program: String,
}

impl PdftopsConverter {
    pub fn new(program: impl Into<String>) -> Self {
        PdftopsConverter {
            program: program.into(),
        }
    }
}

impl Converter for PdftopsConverter {
    async fn to_intermediate(&self, input: &Path, output: &Path) -> Result<(), AssemblyError> {
        // Convert into a temp name, then rename: the artifact's existence is
        // the completion marker, so a crashed pdftops must not leave one.
        let tmp = part_path(output);
        let result = tokio::process::Command::new(&self.program)
            .arg(input)
            .arg(&tmp)
            .output()
            .await
            .map_err(|e| AssemblyError::io(PathBuf::from(&self.program), e))?;
        if !result.status.success() {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AssemblyError::ConversionFailed {
                path: input.to_path_buf(),
            });
        }
        tokio::fs::rename(&tmp, output)
            .await
            .map_err(|e| AssemblyError::io(output, e))?;
        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Run the normalize stage.
pub async fn run<C: Converter>(
    manual: &Manual,
    store: &ArtifactStore,
    converter: &C,
    progress: &ProgressCallback,
) -> Result<(), AssemblyError> {
    let mut plan = Vec::new();
    for chapter in &manual.chapters {
        for section in &chapter.sections {
            if !store.is_normalized(chapter, section) {
                plan.push((
                    section.full_title(chapter.number),
                    store.pdf_path(chapter, section),
                    store.ps_path(chapter, section),
                ));
            }
        }
    }

    info!(
        pending = plan.len(),
        total = manual.section_count(),
        "normalize stage"
    );
    progress.on_stage_start(Stage::Normalize, plan.len());

    for (_, _, output) in &plan {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AssemblyError::io(parent, e))?;
        }
    }

    let results = join_all(plan.iter().map(|(title, input, output)| async move {
        debug!(%title, "converting");
        converter.to_intermediate(input, output).await
    }))
    .await;

    let mut fatal: Option<AssemblyError> = None;
    for ((title, _, _), result) in plan.iter().zip(results) {
        match result {
            Ok(()) => progress.on_section_complete(Stage::Normalize, title),
            Err(e) => {
                progress.on_section_error(Stage::Normalize, title, &e);
                if fatal.is_none() {
                    fatal = Some(e);
                }
            }
        }
    }

    progress.on_stage_complete(Stage::Normalize);
    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
