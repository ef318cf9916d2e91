//! Page-count oracle backed by `pdfinfo`.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::AssemblyError;
use crate::paginate::PageCounter;

static PAGES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^Pages:\s+(\d+)$").unwrap());

/// Counts pages by running `pdfinfo` and parsing its `Pages:` line.
///
/// Any failure mode — the tool missing, a non-zero exit, output without a
/// `Pages:` line — collapses into
/// [`AssemblyError::CouldNotParseDocument`]: from the pipeline's point of
/// view the artifact could not be read, and the remedy is the same.
#[derive(Debug, Clone)]
pub struct PdfinfoCounter {
    program: String,
}

impl PdfinfoCounter {
    pub fn new(program: impl Into<String>) -> Self {
        PdfinfoCounter {
            program: program.into(),
        }
    }
}

impl PageCounter for PdfinfoCounter {
    async fn page_count(&self, path: &Path) -> Result<u32, AssemblyError> {
        let unreadable = || AssemblyError::CouldNotParseDocument {
            path: path.to_path_buf(),
        };

        let output = tokio::process::Command::new(&self.program)
            .arg(path)
            .output()
            .await
            .map_err(|_| unreadable())?;
        if !output.status.success() {
            return Err(unreadable());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let caps = PAGES_RE.captures(&stdout).ok_or_else(unreadable)?;
        let count = caps[1].parse::<u32>().map_err(|_| unreadable())?;
        debug!(path = %path.display(), pages = count, "counted");
        Ok(count)
    }
}
