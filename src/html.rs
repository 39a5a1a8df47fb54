//! Markdown → standalone HTML.
//!
//! Two rules are layered over a stock CommonMark renderer:
//!
//! 1. **Image inlining** — `![alt](images/…)` pointing at a file under the
//!    asset root is replaced by a Base64 `data:` URI, so the HTML file can be
//!    sent as a single attachment and still show the figures extracted from
//!    the PDF. Everything else (remote URLs, missing files) passes through.
//! 2. **Math** — `$…$` and `$$…$$` become MathJax v2 `<script type="math/tex">`
//!    blocks, and the MathJax loader is prepended to the document.

use crate::error::PaperBotError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Link targets starting with this prefix are candidates for inlining.
pub const LOCAL_IMAGE_PREFIX: &str = "images/";

/// MIME type stamped on every inlined image, whatever its real format.
pub const INLINE_IMAGE_MIME: &str = "image/png";

/// MathJax v2 loader and configuration, prepended to every rendered document.
pub const MATHJAX_HEADER: &str = r#"<script type="text/javascript" src="https://cdn.jsdelivr.net/npm/mathjax@2/MathJax.js">
</script>
<script type="text/x-mathjax-config">
MathJax.Hub.Config({
  config: ["MMLorHTML.js"],
  jax: ["input/TeX", "output/HTML-CSS", "output/NativeMML"],
  extensions: ["MathMenu.js", "MathZoom.js"]
});
</script>
"#;

/// Resolves image link targets, inlining local images as `data:` URIs.
#[derive(Debug, Clone)]
pub struct ImageInliner {
    asset_root: PathBuf,
}

impl ImageInliner {
    /// `asset_root` is the directory that `images/...` paths are relative to.
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
        }
    }

    /// The `src` to emit for a link target.
    ///
    /// # Errors
    /// A local image that exists but cannot be read fails the render.
    pub fn resolve(&self, dest: &str) -> Result<String, PaperBotError> {
        let Some(path) = self.local_path(dest) else {
            return Ok(dest.to_string());
        };
        let bytes = std::fs::read(&path).map_err(|e| PaperBotError::io(&path, e))?;
        debug!("Inlining {} ({} bytes)", path.display(), bytes.len());
        Ok(format!(
            "data:{};base64,{}",
            INLINE_IMAGE_MIME,
            STANDARD.encode(bytes)
        ))
    }

    /// The file a target refers to, if it is a local image that exists.
    ///
    /// Only plain relative components are accepted; `..`, `.` and absolute
    /// paths never touch the filesystem.
    fn local_path(&self, dest: &str) -> Option<PathBuf> {
        if !dest.starts_with(LOCAL_IMAGE_PREFIX) {
            return None;
        }
        let rel = Path::new(dest);
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        let path = self.asset_root.join(rel);
        path.is_file().then_some(path)
    }
}

/// Markdown renderer with image inlining and MathJax support.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    inliner: ImageInliner,
}

/// An image whose alt text is still being collected.
struct PendingImage {
    dest: String,
    title: String,
    alt: String,
    /// Nested images inside the label (their text joins the alt).
    depth: usize,
}

impl HtmlRenderer {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            inliner: ImageInliner::new(asset_root),
        }
    }

    /// Render a complete document: MathJax header followed by the body.
    pub fn render(&self, markdown: &str) -> Result<String, PaperBotError> {
        let body = self.render_body(markdown)?;
        Ok(format!("{MATHJAX_HEADER}{body}"))
    }

    /// Render the Markdown body only.
    pub fn render_body(&self, markdown: &str) -> Result<String, PaperBotError> {
        let mut events: Vec<Event<'_>> = Vec::new();
        let mut pending: Option<PendingImage> = None;

        for event in Parser::new_ext(markdown, parser_options()) {
            if let Some(img) = pending.as_mut() {
                match event {
                    Event::Start(Tag::Image { .. }) => img.depth += 1,
                    Event::End(TagEnd::Image) if img.depth > 0 => img.depth -= 1,
                    Event::End(TagEnd::Image) => {
                        let element = self.image_element(img)?;
                        pending = None;
                        events.push(Event::InlineHtml(element.into()));
                    }
                    Event::Text(t) | Event::Code(t) | Event::InlineMath(t) | Event::DisplayMath(t) => {
                        img.alt.push_str(&t)
                    }
                    Event::SoftBreak | Event::HardBreak => img.alt.push(' '),
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::Image {
                    dest_url, title, ..
                }) => {
                    pending = Some(PendingImage {
                        dest: dest_url.into_string(),
                        title: title.into_string(),
                        alt: String::new(),
                        depth: 0,
                    });
                }
                Event::InlineMath(m) => events.push(math_script(&m, false)),
                Event::DisplayMath(m) => events.push(math_script(&m, true)),
                other => events.push(other),
            }
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        Ok(out)
    }

    fn image_element(&self, img: &PendingImage) -> Result<String, PaperBotError> {
        let src = self.inliner.resolve(&img.dest)?;
        let mut el = format!("<img src=\"{}\"", escape_attr(&src));
        if !img.title.is_empty() {
            el.push_str(&format!(" title=\"{}\"", escape_attr(&img.title)));
        }
        el.push_str(&format!(" alt=\"{}\" />", escape_attr(&img.alt)));
        Ok(el)
    }
}

/// Render `markdown` with images resolved against `asset_root`.
pub fn render_html(markdown: &str, asset_root: impl Into<PathBuf>) -> Result<String, PaperBotError> {
    HtmlRenderer::new(asset_root).render(markdown)
}

fn parser_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_MATH);
    opts
}

/// MathJax v2 reads TeX from script bodies verbatim, so no escaping.
fn math_script(tex: &str, display: bool) -> Event<'static> {
    let kind = if display {
        "math/tex; mode=display"
    } else {
        "math/tex"
    };
    Event::InlineHtml(CowStr::from(format!(
        "<script type=\"{kind}\">{tex}</script>"
    )))
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img_srcs(html: &str) -> Vec<String> {
        html.split("<img src=\"")
            .skip(1)
            .map(|rest| rest.split('"').next().unwrap_or("").to_string())
            .collect()
    }

    fn fixture() -> (tempfile::TempDir, Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images/job1")).unwrap();
        let bytes = vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3, 254, 255];
        std::fs::write(dir.path().join("images/job1/fig.png"), &bytes).unwrap();
        (dir, bytes)
    }

    #[test]
    fn local_image_becomes_data_uri() {
        let (dir, bytes) = fixture();
        let html = render_html("See ![Figure 1](images/job1/fig.png)", dir.path()).unwrap();
        let srcs = img_srcs(&html);
        assert_eq!(srcs.len(), 1);
        let payload = srcs[0]
            .strip_prefix("data:image/png;base64,")
            .expect("data uri");
        assert_eq!(STANDARD.decode(payload).unwrap(), bytes);
        assert!(html.contains("alt=\"Figure 1\""));
    }

    #[test]
    fn remote_and_missing_targets_pass_through() {
        let (dir, _) = fixture();
        let md = "![a](https://arxiv.org/fig.png) ![b](images/job1/missing.png) ![c](figs/x.png)";
        let html = render_html(md, dir.path()).unwrap();
        assert_eq!(
            img_srcs(&html),
            vec![
                "https://arxiv.org/fig.png".to_string(),
                "images/job1/missing.png".to_string(),
                "figs/x.png".to_string(),
            ]
        );
    }

    #[test]
    fn parent_components_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("secret.png"), b"x").unwrap();
        let html = render_html("![s](images/../secret.png)", dir.path()).unwrap();
        assert_eq!(img_srcs(&html), vec!["images/../secret.png".to_string()]);
    }

    #[test]
    fn title_and_plain_alt_are_carried() {
        let dir = tempfile::tempdir().unwrap();
        let html = render_html(
            "![An *emphasised* `label`](https://x.invalid/p.png \"Caption & more\")",
            dir.path(),
        )
        .unwrap();
        assert!(html.contains("alt=\"An emphasised label\""), "got: {html}");
        assert!(html.contains("title=\"Caption &amp; more\""), "got: {html}");
    }

    #[test]
    fn document_starts_with_mathjax() {
        let dir = tempfile::tempdir().unwrap();
        let html = render_html("# Title", dir.path()).unwrap();
        assert!(html.starts_with("<script type=\"text/javascript\""));
        assert!(html.contains("<h1>Title</h1>"));
    }

    #[test]
    fn dollar_math_becomes_mathjax_script() {
        let dir = tempfile::tempdir().unwrap();
        let html = render_html("Energy $E=mc^2$ and\n\n$$a<b$$", dir.path()).unwrap();
        assert!(html.contains("<script type=\"math/tex\">E=mc^2</script>"), "got: {html}");
        assert!(
            html.contains("<script type=\"math/tex; mode=display\">a<b</script>"),
            "got: {html}"
        );
    }
}
