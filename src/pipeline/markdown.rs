//! Stage 4: write images, emit Markdown, clean it up.
//!
//! ## Rule Order
//!
//! Cleanup rules are pure `&str → String` passes. Line endings are
//! normalised before trimming, and the final-newline pass runs last.

use super::parse::Block;
use crate::convert::ConversionJob;
use crate::error::PaperBotError;
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use tracing::debug;

/// Write every image block under the job's image directory and return the
/// Markdown for all blocks, cleaned.
pub fn render_blocks(blocks: &[Block], job: &ConversionJob) -> Result<String, PaperBotError> {
    let mut parts: Vec<String> = Vec::with_capacity(blocks.len());
    let mut dir_ready = false;

    for block in blocks {
        match block {
            Block::Heading { level, text } => {
                parts.push(format!("{} {}", "#".repeat(*level as usize), text))
            }
            Block::Paragraph(text) => parts.push(text.clone()),
            Block::Image { name, image } => {
                if !dir_ready {
                    std::fs::create_dir_all(&job.image_dir)
                        .map_err(|e| PaperBotError::io(&job.image_dir, e))?;
                    dir_ready = true;
                }
                let bytes = encode_png(image).map_err(|e| PaperBotError::ExtractionFailed {
                    page: page_of(name),
                    detail: format!("Image encoding failed: {}", e),
                })?;
                let path = job.image_dir.join(name);
                std::fs::write(&path, &bytes).map_err(|e| PaperBotError::io(&path, e))?;
                debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
                parts.push(format!("![{}]({}/{})", name, job.link_prefix, name));
            }
        }
    }

    Ok(clean_markdown(&parts.join("\n\n")))
}

/// PNG-encode an image.
///
/// PNG has no float sample formats, so HDR buffers are narrowed to 8-bit
/// RGBA first.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let narrowed;
    let img = match img {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            narrowed = DynamicImage::ImageRgba8(img.to_rgba8());
            &narrowed
        }
        other => other,
    };
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Recover the 1-based page number from a `pageNNN_imgMM.png` name.
fn page_of(name: &str) -> usize {
    name.strip_prefix("page")
        .and_then(|rest| rest.get(..3))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Apply all cleanup rules, in order:
///
/// 1. Normalise line endings (CRLF → LF)
/// 2. Trim trailing whitespace per line
/// 3. Collapse runs of blank lines to a single blank line
/// 4. Ensure heading lines have a blank line before them
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Ensure the file ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 3: Collapse blank lines ─────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 4: Normalise heading spacing ────────────────────────────────────────

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    for (i, line) in input.lines().enumerate() {
        let is_heading = line.starts_with('#') && line.trim_start_matches('#').starts_with(' ');
        if is_heading && i > 0 {
            let trimmed = result.trim_end_matches('\n');
            result.truncate(trimmed.len());
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 6: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_heading_spacing() {
        let result = normalise_heading_spacing("some text\n## Heading\nmore text");
        assert!(result.contains("\n\n## Heading\n"));
        // A hashtag is not a heading.
        let result = normalise_heading_spacing("a\n#tag");
        assert_eq!(result, "a\n#tag\n");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_page_of() {
        assert_eq!(page_of("page012_img01.png"), 12);
        assert_eq!(page_of("figure.png"), 0);
    }

    #[test]
    fn images_written_under_job_dir() {
        let workspace = tempfile::tempdir().unwrap();
        let job = ConversionJob::new(workspace.path(), "42");
        let red = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 20, Rgba([255, 0, 0, 255])));
        let blocks = vec![
            Block::Heading {
                level: 2,
                text: "1 Introduction".into(),
            },
            Block::Paragraph("Body\u{200B} text.   ".into()),
            Block::Image {
                name: "page001_img01.png".into(),
                image: red,
            },
        ];

        let md = render_blocks(&blocks, &job).unwrap();
        assert_eq!(
            md,
            "## 1 Introduction\n\nBody text.\n\n![page001_img01.png](images/42/page001_img01.png)\n"
        );

        let written = std::fs::read(workspace.path().join("images/42/page001_img01.png")).unwrap();
        assert!(written.starts_with(b"\x89PNG"));
    }

    #[test]
    fn text_only_document_creates_no_image_dir() {
        let workspace = tempfile::tempdir().unwrap();
        let job = ConversionJob::new(workspace.path(), "7");
        let md = render_blocks(&[Block::Paragraph("x".into())], &job).unwrap();
        assert_eq!(md, "x\n");
        assert!(!workspace.path().join("images/7").exists());
    }

    #[test]
    fn float_images_are_narrowed() {
        let img = DynamicImage::new_rgba32f(4, 4);
        let png = encode_png(&img).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }

    #[test]
    fn empty_document_is_single_newline() {
        let workspace = tempfile::tempdir().unwrap();
        let job = ConversionJob::new(workspace.path(), "0");
        assert_eq!(render_blocks(&[], &job).unwrap(), "\n");
    }
}
