//! Stage 2: pull text and raster images out of every page.
//!
//! Runs on the blocking pool (see [`crate::convert`]); pdfium is not
//! async-safe.

use super::classify::DocumentKind;
use crate::error::PaperBotError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

/// Embedded images smaller than this on either edge are layout debris
/// (rules, bullets, spacer pixels) and are skipped.
pub const MIN_IMAGE_EDGE: u32 = 16;

/// Raw material for one page.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 0-based page index.
    pub index: usize,
    pub text: String,
    pub images: Vec<DynamicImage>,
}

/// Extract every page of `document`.
///
/// `Text` documents yield the text layer plus embedded images; `Scanned`
/// documents yield whatever text exists plus one rasterised image of the
/// whole page, longest edge capped at `max_rendered_pixels`.
pub fn analyze(
    document: &PdfDocument<'_>,
    kind: DocumentKind,
    max_rendered_pixels: u32,
) -> Result<Vec<PageContent>, PaperBotError> {
    let render_config = PdfRenderConfig::new()
        .set_target_width(max_rendered_pixels as i32)
        .set_maximum_height(max_rendered_pixels as i32);

    let mut pages = Vec::with_capacity(document.pages().len() as usize);
    for (index, page) in document.pages().iter().enumerate() {
        let failed = |e: PdfiumError| PaperBotError::ExtractionFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        };

        let text = page.text().map_err(failed)?.all();

        let images = match kind {
            DocumentKind::Text => embedded_images(&page, index),
            DocumentKind::Scanned => {
                let image = page.render_with_config(&render_config).map_err(failed)?.as_image();
                debug!(
                    "Rasterised page {} → {}x{} px",
                    index + 1,
                    image.width(),
                    image.height()
                );
                vec![image]
            }
        };

        pages.push(PageContent {
            index,
            text,
            images,
        });
    }
    Ok(pages)
}

/// Raster images placed on the page, in object order.
///
/// An image pdfium cannot decode is logged and skipped; losing a figure is
/// better than losing the paper.
fn embedded_images(page: &PdfPage<'_>, index: usize) -> Vec<DynamicImage> {
    let mut images = Vec::new();
    for object in page.objects().iter() {
        let Some(image_object) = object.as_image_object() else {
            continue;
        };
        match image_object.get_raw_image() {
            Ok(image) if image.width() >= MIN_IMAGE_EDGE && image.height() >= MIN_IMAGE_EDGE => {
                images.push(image)
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping undecodable image on page {}: {:?}", index + 1, e),
        }
    }
    if !images.is_empty() {
        debug!("Page {}: {} embedded images", index + 1, images.len());
    }
    images
}
