//! Merge stage: combine every normalized section into the final PDF.
//!
//! Unlike fetch and normalize, this stage always re-runs: the combined
//! output cannot be judged complete by existence alone (a previous run may
//! have merged fewer sections), and re-merging is the cheapest operation in
//! the pipeline. The bookmark descriptor rides along as the last input so
//! the combiner materialises the TOC while writing the document.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AssemblyError;
use crate::manual::Manual;
use crate::progress::{ProgressCallback, Stage};
use crate::store::ArtifactStore;

/// Combines normalized sections plus the bookmark descriptor into one PDF.
pub trait Combiner: Send + Sync {
    fn combine(
        &self,
        inputs: &[PathBuf],
        marks: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<(), AssemblyError>> + Send;
}

/// The real combiner, shelling out to GhostScript's pdfwrite device.
#[derive(Debug, Clone)]
pub struct GhostscriptCombiner {
    program: String,
}

impl GhostscriptCombiner {
    pub fn new(program: impl Into<String>) -> Self {
        GhostscriptCombiner {
            program: program.into(),
        }
    }
}

impl Combiner for GhostscriptCombiner {
    async fn combine(
        &self,
        inputs: &[PathBuf],
        marks: &Path,
        output: &Path,
    ) -> Result<(), AssemblyError> {
        let result = tokio::process::Command::new(&self.program)
            .arg("-dBATCH")
            .arg("-sDEVICE=pdfwrite")
            .arg("-o")
            .arg(output)
            .args(inputs)
            .arg(marks)
            .output()
            .await
            .map_err(|e| AssemblyError::io(PathBuf::from(&self.program), e))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AssemblyError::MergeFailed {
                detail: format!(
                    "{} exited with {}: {}",
                    self.program,
                    result.status,
                    stderr.lines().last().unwrap_or("")
                ),
            });
        }
        Ok(())
    }
}

/// Run the merge stage, returning the path of the combined PDF.
pub async fn run<M: Combiner>(
    manual: &Manual,
    store: &ArtifactStore,
    combiner: &M,
    filename: &str,
    progress: &ProgressCallback,
) -> Result<PathBuf, AssemblyError> {
    let mut inputs = Vec::with_capacity(manual.section_count());
    for chapter in &manual.chapters {
        for section in &chapter.sections {
            let path = store.ps_path(chapter, section);
            if !path.exists() {
                return Err(AssemblyError::SectionNotReady {
                    title: section.full_title(chapter.number),
                });
            }
            inputs.push(path);
        }
    }

    let output = store.output_path(filename);
    info!(sections = inputs.len(), output = %output.display(), "merge stage");
    progress.on_stage_start(Stage::Merge, inputs.len());

    combiner
        .combine(&inputs, &store.pdfmarks_path(), &output)
        .await?;

    progress.on_stage_complete(Stage::Merge);
    Ok(output)
}
