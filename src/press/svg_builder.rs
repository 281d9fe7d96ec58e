//! SVG renderer: accumulates SVG elements per page and produces the
//! final strings.
//!
//! Glyphs are written as text in a SMuFL font; glyphs the table has no
//! codepoint for are drawn as their outline box.

use crate::plate::{Position, Rect};

use super::{GlyphMark, Renderer};

const NOTE_COLOR: &str = "#1a1a1a";
const FONT_FAMILY: &str = "Bravura, 'Leland', serif";

/// Milli-pixels to SVG user units.
fn px(v: i64) -> f64 {
    v as f64 / 1000.0
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

// ═══════════════════════════════════════════════════════════════════════
// SvgRenderer
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct SvgRenderer {
    elements: Vec<String>,
    width: f64,
    height: f64,
    pages: Vec<String>,
}

impl SvgRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished pages, in the order they were printed.
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<String> {
        self.pages
    }

    fn build(&mut self) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
            self.width, self.height, self.width, self.height
        );
        svg.push('\n');
        for el in self.elements.drain(..) {
            svg.push_str("  ");
            svg.push_str(&el);
            svg.push('\n');
        }
        svg.push_str("</svg>\n");
        svg
    }
}

impl Renderer for SvgRenderer {
    fn begin_page(&mut self, _number: usize, width: i64, height: i64) {
        self.elements.clear();
        self.width = px(width);
        self.height = px(height);
        self.elements.push(format!(
            r#"<rect x="0" y="0" width="{:.1}" height="{:.1}" fill="white"/>"#,
            self.width, self.height
        ));
    }

    fn line(&mut self, from: Position, to: Position, thickness: i64) {
        self.elements.push(format!(
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="{:.2}"/>"#,
            px(from.x),
            px(from.y),
            px(to.x),
            px(to.y),
            NOTE_COLOR,
            px(thickness)
        ));
    }

    fn rect(&mut self, rect: &Rect) {
        if rect.is_empty() {
            return;
        }
        self.elements.push(format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
            px(rect.left),
            px(rect.top),
            px(rect.width()),
            px(rect.height()),
            NOTE_COLOR
        ));
    }

    fn polygon(&mut self, points: &[Position]) {
        let Some((first, rest)) = points.split_first() else { return };
        let mut d = format!("M{:.2},{:.2}", px(first.x), px(first.y));
        for p in rest {
            d.push_str(&format!(" L{:.2},{:.2}", px(p.x), px(p.y)));
        }
        d.push_str(" Z");
        self.elements.push(format!(r#"<path d="{}" fill="{}"/>"#, d, NOTE_COLOR));
    }

    fn curve(&mut self, points: &[Position; 4], thickness: i64) {
        let [p0, p1, p2, p3] = points;
        self.elements.push(format!(
            r#"<path d="M{:.2},{:.2} C{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" fill="none" stroke="{}" stroke-width="{:.2}" stroke-linecap="round"/>"#,
            px(p0.x),
            px(p0.y),
            px(p1.x),
            px(p1.y),
            px(p2.x),
            px(p2.y),
            px(p3.x),
            px(p3.y),
            NOTE_COLOR,
            px(thickness)
        ));
    }

    fn glyph(&mut self, mark: &GlyphMark<'_>) {
        match mark.codepoint {
            Some(c) => self.elements.push(format!(
                r#"<text x="{:.2}" y="{:.2}" font-family="{}" font-size="{:.1}" fill="{}" data-glyph="{}">&#x{:X};</text>"#,
                px(mark.bounding_box.left),
                px(mark.baseline),
                FONT_FAMILY,
                px(mark.font_size),
                NOTE_COLOR,
                escape(mark.id.as_str()),
                c as u32
            )),
            None => {
                let b = &mark.bounding_box;
                self.elements.push(format!(
                    r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="{}" stroke-width="0.5" data-glyph="{}"/>"#,
                    px(b.left),
                    px(b.top),
                    px(b.width()),
                    px(b.height()),
                    NOTE_COLOR,
                    escape(mark.id.as_str())
                ));
            }
        }
    }

    fn text(&mut self, text: &str, baseline: Position, font_size: i64) {
        self.elements.push(format!(
            r#"<text x="{:.2}" y="{:.2}" font-family="Times New Roman, serif" font-size="{:.1}" font-style="italic" fill="{}">{}</text>"#,
            px(baseline.x),
            px(baseline.y),
            px(font_size),
            NOTE_COLOR,
            escape(text)
        ));
    }

    fn end_page(&mut self) {
        let page = self.build();
        self.pages.push(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_escaped() {
        let mut svg = SvgRenderer::new();
        svg.begin_page(0, 100_000, 50_000);
        svg.text("a < b & c", Position::new(1000, 2000), 10_000);
        svg.end_page();
        let page = &svg.pages()[0];
        assert!(page.contains("a &lt; b &amp; c"));
        assert!(page.contains(r#"viewBox="0 0 100 50""#));
    }

    #[test]
    fn empty_rects_are_skipped() {
        let mut svg = SvgRenderer::new();
        svg.begin_page(0, 100_000, 50_000);
        svg.rect(&Rect::EMPTY);
        svg.end_page();
        assert_eq!(svg.pages()[0].matches("<rect").count(), 1);
    }
}
