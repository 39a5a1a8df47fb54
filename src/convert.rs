//! PDF → Markdown conversion entry points.
//!
//! [`DocumentConverter`] is the seam the dispatcher talks to; the production
//! implementation, [`PdfiumConverter`], runs the four pipeline stages on the
//! blocking pool:
//!
//! ```text
//! classify ──▶ analyze ──▶ parse ──▶ markdown
//! (magic,     (text +     (headings, (PNG files +
//!  kind)       images)     paragraphs) cleanup)
//! ```

use crate::config::{BotConfig, ConversionSettings};
use crate::error::PaperBotError;
use crate::html::LOCAL_IMAGE_PREFIX;
use crate::pipeline::{analyze, classify, markdown, parse};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Where one conversion writes its images and how Markdown links to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    /// Job identifier; a path-safe form of the triggering message id.
    pub id: String,
    /// `<workspace>/images/<id>`.
    pub image_dir: PathBuf,
    /// `images/<id>`, the relative prefix used in image links.
    pub link_prefix: String,
}

impl ConversionJob {
    /// A job rooted at `workspace`. Characters outside `[A-Za-z0-9_-]` in
    /// `id` are replaced with `_` so the id is always a single path segment.
    pub fn new(workspace: &Path, id: &str) -> Self {
        let id: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let id = if id.is_empty() { "_".to_string() } else { id };
        let link_prefix = format!("{LOCAL_IMAGE_PREFIX}{id}");
        Self {
            image_dir: workspace.join(&link_prefix),
            link_prefix,
            id,
        }
    }

    pub fn for_config(config: &BotConfig, id: &str) -> Self {
        Self::new(&config.workspace_dir, id)
    }
}

/// Anything that turns PDF bytes into Markdown.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `pdf`, writing images under `job.image_dir`.
    ///
    /// Either the whole document converts or an error is returned; there is
    /// no partial output.
    async fn convert(&self, pdf: Vec<u8>, job: &ConversionJob) -> Result<String, PaperBotError>;
}

/// Converter backed by the pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumConverter {
    settings: ConversionSettings,
}

impl PdfiumConverter {
    pub fn new(settings: ConversionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl DocumentConverter for PdfiumConverter {
    async fn convert(&self, pdf: Vec<u8>, job: &ConversionJob) -> Result<String, PaperBotError> {
        // Cheap rejection before touching the blocking pool or pdfium.
        classify::check_magic(&pdf)?;

        let start = Instant::now();
        let settings = self.settings.clone();
        let task_job = job.clone();
        let markdown = tokio::task::spawn_blocking(move || convert_blocking(pdf, &settings, &task_job))
            .await
            .map_err(|e| PaperBotError::Internal(format!("Conversion task panicked: {}", e)))??;

        info!(
            "Converted job {} in {}ms: {} chars",
            job.id,
            start.elapsed().as_millis(),
            markdown.len()
        );
        Ok(markdown)
    }
}

/// Convenience wrapper: convert with a throwaway [`PdfiumConverter`].
pub async fn convert_pdf(
    pdf: Vec<u8>,
    job: &ConversionJob,
    settings: &ConversionSettings,
) -> Result<String, PaperBotError> {
    PdfiumConverter::new(settings.clone()).convert(pdf, job).await
}

fn convert_blocking(
    pdf: Vec<u8>,
    settings: &ConversionSettings,
    job: &ConversionJob,
) -> Result<String, PaperBotError> {
    let pdfium = bind_pdfium(settings.pdfium_library_path.as_deref())?;

    let document = classify::load_document(&pdfium, pdf)?;
    let kind = classify::classify(&document, settings.scanned_chars_per_page)?;
    let pages = analyze::analyze(&document, kind, settings.max_rendered_pixels)?;
    let blocks: Vec<parse::Block> = pages.into_iter().flat_map(parse::parse_page).collect();
    markdown::render_blocks(&blocks, job)
}

/// Bind to pdfium in `dir`, or to the system library when `dir` is `None`.
fn bind_pdfium(dir: Option<&Path>) -> Result<Pdfium, PaperBotError> {
    let bindings = match dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PaperBotError::PdfiumBindingFailed(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}
