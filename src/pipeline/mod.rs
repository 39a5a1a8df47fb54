//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, and the
//! stages run strictly in order.
//!
//! ## Data Flow
//!
//! ```text
//! classify ──▶ analyze ──▶ parse ──▶ markdown
//! ```
//!
//! 1. [`classify`] — check the `%PDF` magic, load the document, decide
//!    `Text` vs `Scanned`
//! 2. [`analyze`]  — per page: text layer plus embedded images, or a
//!    rasterised page for scanned documents
//! 3. [`parse`]    — headings, paragraphs and image blocks; pure and
//!    pdfium-free
//! 4. [`markdown`] — write PNGs under the job directory, emit Markdown and
//!    run the cleanup rules

pub mod analyze;
pub mod classify;
pub mod markdown;
pub mod parse;
