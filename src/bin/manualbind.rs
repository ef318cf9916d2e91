//! `manualbind` — assemble a sectioned online manual into one bookmarked PDF.
//!
//! ```text
//! manualbind http://servicecenters.example.com/amm/toc.html \
//!     --author "Cirrus Design" \
//!     --skip-unavailable "Log of Temporary Revisions"
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use url::Url;

use manualbind::{assemble, AssemblyConfig, AssemblyError, AssemblyProgressCallback, Stage};

#[derive(Parser, Debug)]
#[command(
    name = "manualbind",
    version,
    about = "Assemble a manual published as per-section PDFs into one bookmarked PDF",
    long_about = "Downloads every section listed on the manual's table-of-contents page, \
                  normalizes each to PostScript, computes page-accurate bookmarks, and \
                  combines everything into a single PDF.\n\n\
                  The working directory holds all intermediate state; re-running after a \
                  failure resumes from whatever is already on disk."
)]
struct Cli {
    /// URL of the manual's table-of-contents page
    toc_url: Url,

    /// Working directory for the snapshot and all intermediate artifacts
    #[arg(short = 'w', long, default_value = "work", value_name = "DIR")]
    work: PathBuf,

    /// File name of the combined PDF, written inside the working directory
    #[arg(short = 'f', long, default_value = "manual.pdf", value_name = "NAME")]
    filename: String,

    /// Document author recorded in the PDF info dictionary
    #[arg(long, value_name = "NAME")]
    author: Option<String>,

    /// Section title known to 404 on the publisher's site; prune instead of
    /// failing (repeatable)
    #[arg(long = "skip-unavailable", value_name = "TITLE")]
    skip_unavailable: Vec<String>,

    /// Per-download timeout in seconds
    #[arg(long, default_value_t = 120, value_name = "SECS")]
    download_timeout: u64,

    /// pdfinfo program name or path
    #[arg(long, env = "MANUALBIND_PDFINFO", default_value = "pdfinfo", value_name = "PROG")]
    pdfinfo: String,

    /// pdftops program name or path
    #[arg(long, env = "MANUALBIND_PDFTOPS", default_value = "pdftops", value_name = "PROG")]
    pdftops: String,

    /// GhostScript program name or path
    #[arg(long, env = "MANUALBIND_GS", default_value = "gs", value_name = "PROG")]
    gs: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

/// Drives one indicatif bar per stage.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Self {
        CliProgressCallback {
            bar: Mutex::new(None),
        }
    }
}

impl AssemblyProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{prefix:>10} [{bar:40}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix(stage.to_string());
        *self.bar.lock().unwrap() = Some(bar);
    }

    fn on_section_complete(&self, _stage: Stage, title: &str) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            bar.set_message(title.to_string());
            bar.inc(1);
        }
    }

    fn on_section_error(&self, _stage: Stage, title: &str, error: &AssemblyError) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            bar.println(format!("✗ {title}: {error}"));
            bar.inc(1);
        }
    }

    fn on_stage_complete(&self, _stage: Stage) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

fn init_logging(cli: &Cli, progress_active: bool) {
    use tracing_subscriber::EnvFilter;

    // With the progress bar active the bar is the feedback channel; keep
    // the log stream down to errors so the two don't interleave.
    let default_filter = if cli.quiet || progress_active {
        "error"
    } else if cli.verbose {
        "manualbind=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let progress_active = !cli.no_progress && !cli.quiet && !cli.verbose;
    init_logging(&cli, progress_active);

    let mut builder = AssemblyConfig::builder(cli.toc_url.clone())
        .work_dir(&cli.work)
        .filename(&cli.filename)
        .download_timeout_secs(cli.download_timeout)
        .pdfinfo_program(&cli.pdfinfo)
        .pdftops_program(&cli.pdftops)
        .ghostscript_program(&cli.gs);
    if let Some(author) = &cli.author {
        builder = builder.author(author);
    }
    for title in &cli.skip_unavailable {
        builder = builder.skip_unavailable(title);
    }
    if progress_active {
        builder = builder.progress_callback(Arc::new(CliProgressCallback::new()));
    }
    let config = builder.build().context("invalid arguments")?;

    let output = assemble(&config).await?;
    println!("{}", output.display());
    Ok(())
}
