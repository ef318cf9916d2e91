//! Pipeline stages for manual assembly.
//!
//! Each submodule implements exactly one stage, behind a trait seam so the
//! external collaborator (the site, poppler, GhostScript) can be replaced
//! in tests without touching the stage logic.
//!
//! ## Data Flow
//!
//! ```text
//! toc ──▶ fetch ──▶ normalize ──▶ oracle ──▶ merge
//! (HTML)  (HTTP)    (pdftops)    (pdfinfo)  (gs)
//! ```
//!
//! 1. [`toc`]       — parse the publisher's TOC page into an outline
//! 2. [`fetch`]     — download missing section PDFs concurrently
//! 3. [`normalize`] — strip each PDF to plain PostScript via `pdftops`
//! 4. [`oracle`]    — per-section page counts via `pdfinfo`, consumed by
//!    [`crate::paginate::PageTable`] during bookmark generation
//! 5. [`merge`]     — combine everything plus the bookmark descriptor via
//!    GhostScript's pdfwrite device

pub mod fetch;
pub mod merge;
pub mod normalize;
pub mod oracle;
pub mod toc;
