//! Stage 3: turn raw page text into content blocks.
//!
//! The text layer of a paper is a stream of visual lines. This stage
//! recovers just enough structure for readable Markdown:
//!
//! - numbered section titles (`3`, `3.2`, `A.1` followed by a capitalised
//!   title) and the usual unnumbered ones (`Abstract`, `References`, …)
//!   become headings;
//! - everything else is grouped into paragraphs, with line-end hyphenation
//!   undone;
//! - bare page numbers are dropped.

use super::analyze::PageContent;
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;

/// One unit of output.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// `level` is the Markdown heading depth (2 for top-level sections).
    Heading { level: u8, text: String },
    Paragraph(String),
    Image { name: String, image: DynamicImage },
}

/// Unnumbered section titles recognised on a line of their own.
const WELL_KNOWN_TITLES: &[&str] = &[
    "abstract",
    "introduction",
    "related work",
    "background",
    "method",
    "methods",
    "experiments",
    "results",
    "discussion",
    "conclusion",
    "conclusions",
    "acknowledgments",
    "acknowledgements",
    "references",
    "bibliography",
    "appendix",
];

/// Longest line still considered a heading.
const MAX_HEADING_CHARS: usize = 80;

static RE_NUMBERED_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}(?:\.\d{1,2}){0,3}|[A-Z](?:\.\d{1,2}){1,3})\.?\s+(\p{Lu}[^.]*)$")
        .unwrap()
});

static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:page\s+)?\d{1,4}(?:\s*(?:/|of)\s*\d{1,4})?$").unwrap()
});

/// Parse one page, appending its images after the text.
pub fn parse_page(page: PageContent) -> Vec<Block> {
    let mut blocks = parse_page_text(&page.text);
    for (i, image) in page.images.into_iter().enumerate() {
        blocks.push(Block::Image {
            name: format!("page{:03}_img{:02}.png", page.index + 1, i + 1),
            image,
        });
    }
    blocks
}

/// Parse page text into headings and paragraphs.
pub fn parse_page_text(text: &str) -> Vec<Block> {
    // pdfium separates visual lines with CRLF.
    let text = text.replace("\r\n", "\n");
    let lines: Vec<&str> = text.split(['\n', '\r']).map(|l| l.trim()).collect();
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let mut blocks = Vec::new();
    let mut paragraph = String::new();

    for line in lines {
        if line.is_empty() {
            flush(&mut paragraph, &mut blocks);
            continue;
        }
        if RE_PAGE_NUMBER.is_match(line) {
            continue;
        }
        if let Some((level, title)) = heading(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading { level, text: title });
            continue;
        }

        join_line(&mut paragraph, line);

        // A short line that ends a sentence closes the paragraph.
        let ends_sentence = line.ends_with(['.', '!', '?', ':']);
        if ends_sentence && line.chars().count() * 10 < widest * 7 {
            flush(&mut paragraph, &mut blocks);
        }
    }
    flush(&mut paragraph, &mut blocks);
    blocks
}

fn heading(line: &str) -> Option<(u8, String)> {
    if line.chars().count() > MAX_HEADING_CHARS {
        return None;
    }
    let lower = line.to_lowercase();
    if WELL_KNOWN_TITLES.contains(&lower.as_str()) {
        return Some((2, line.to_string()));
    }
    let caps = RE_NUMBERED_HEADING.captures(line)?;
    let depth = caps[1].split('.').count();
    Some(((depth + 1).min(6) as u8, line.to_string()))
}

/// Append `line` to `paragraph`, undoing a line-end hyphen when the next
/// line continues the word in lower case.
fn join_line(paragraph: &mut String, line: &str) {
    if paragraph.is_empty() {
        paragraph.push_str(line);
        return;
    }
    let hyphenated = paragraph.ends_with('-')
        && paragraph
            .chars()
            .rev()
            .nth(1)
            .is_some_and(|c| c.is_alphabetic())
        && line.chars().next().is_some_and(|c| c.is_lowercase());
    if hyphenated {
        paragraph.pop();
    } else {
        paragraph.push(' ');
    }
    paragraph.push_str(line);
}

fn flush(paragraph: &mut String, blocks: &mut Vec<Block>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph(std::mem::take(paragraph)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(s: &str) -> Block {
        Block::Paragraph(s.to_string())
    }

    fn head(level: u8, s: &str) -> Block {
        Block::Heading {
            level,
            text: s.to_string(),
        }
    }

    #[test]
    fn numbered_and_named_headings() {
        let blocks = parse_page_text("Abstract\nWe study things.\n\n3.2 Results\nThey hold.\n\nA.1 Proofs\n");
        assert_eq!(
            blocks,
            vec![
                head(2, "Abstract"),
                para("We study things."),
                head(3, "3.2 Results"),
                para("They hold."),
                head(3, "A.1 Proofs"),
            ]
        );
    }

    #[test]
    fn article_letter_is_not_an_appendix() {
        assert_eq!(
            parse_page_text("A Study of Everything"),
            vec![para("A Study of Everything")]
        );
    }

    #[test]
    fn sentence_is_not_a_heading() {
        let blocks = parse_page_text("2 The model is trained for ten epochs. We then stop.");
        assert_eq!(
            blocks,
            vec![para("2 The model is trained for ten epochs. We then stop.")]
        );
    }

    #[test]
    fn page_numbers_dropped() {
        let blocks = parse_page_text("Some text here\n12\nPage 3 of 10\n4/9\n");
        assert_eq!(blocks, vec![para("Some text here")]);
    }

    #[test]
    fn lines_joined_and_dehyphenated() {
        let text = "the trans-\r\nformer architecture is widely\r\nused and\r\nSelf-Attention works";
        assert_eq!(
            parse_page_text(text),
            vec![para(
                "the transformer architecture is widely used and Self-Attention works"
            )]
        );
    }

    #[test]
    fn uppercase_continuation_keeps_hyphen() {
        assert_eq!(
            parse_page_text("pre-\nTrained"),
            vec![para("pre- Trained")]
        );
    }

    #[test]
    fn short_sentence_end_closes_paragraph() {
        let text = "This first line is long enough to set the page width for us.\nIt ends here.\nNext paragraph starts.";
        assert_eq!(
            parse_page_text(text),
            vec![
                para("This first line is long enough to set the page width for us. It ends here."),
                para("Next paragraph starts."),
            ]
        );
    }

    #[test]
    fn images_follow_text_with_stable_names() {
        let page = PageContent {
            index: 4,
            text: "Figure text".into(),
            images: vec![DynamicImage::new_rgb8(20, 20), DynamicImage::new_rgb8(30, 30)],
        };
        let blocks = parse_page(page);
        assert_eq!(blocks.len(), 3);
        match &blocks[2] {
            Block::Image { name, .. } => assert_eq!(name, "page005_img02.png"),
            other => panic!("expected image, got {other:?}"),
        }
    }
}
