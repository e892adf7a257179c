//! Shopping list export.
//!
//! Layout is computed in points (1/72 in) on A4 pages and kept separate from
//! PDF emission so pagination can be checked without a font file.

use std::{fs, io::Cursor, path::Path};

use anyhow::{Context, anyhow, bail};
use printpdf::{BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, Pt, Rgb};

use crate::shopping_list::ShoppingList;

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;

pub const TITLE: &str = "Foodgram shopping list";
pub const TITLE_POS: (f32, f32) = (150.0, 800.0);
pub const TITLE_SIZE: f32 = 24.0;

pub const BODY_X: f32 = 72.0;
pub const BODY_TOP: f32 = 700.0;
pub const BODY_SIZE: f32 = 16.0;
pub const LINE_HEIGHT: f32 = 30.0;
pub const BOTTOM_MARGIN: f32 = 40.0;

pub const CREDIT: &str = "Made with Foodgram";
pub const CREDIT_POS: (f32, f32) = (140.0, 20.0);
pub const CREDIT_SIZE: f32 = 14.0;

pub const FILENAME: &str = "foodgram.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontRole {
    /// The embedded TrueType font, used for anything user-supplied.
    Body,
    /// Built-in Helvetica in red.
    Credit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub font: FontRole,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub texts: Vec<PlacedText>,
}

/// Font bytes loaded once at startup.
#[derive(Debug, Clone)]
pub struct BodyFont {
    bytes: Vec<u8>,
}

impl BodyFont {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("cannot read shopping list font {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("invalid font file {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> anyhow::Result<Self> {
        if !has_font_signature(&bytes) {
            bail!("not a TrueType or OpenType font");
        }
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn has_font_signature(bytes: &[u8]) -> bool {
    matches!(
        bytes.get(..4),
        Some([0x00, 0x01, 0x00, 0x00]) | Some(b"OTTO") | Some(b"true") | Some(b"ttcf")
    )
}

/// Places the title, one line per item, and the credit on the last page.
pub fn layout(list: &ShoppingList) -> Vec<PageLayout> {
    let mut pages = vec![PageLayout::default()];
    pages[0].texts.push(PlacedText {
        text: TITLE.to_string(),
        x: TITLE_POS.0,
        y: TITLE_POS.1,
        size: TITLE_SIZE,
        font: FontRole::Body,
    });

    let mut y = BODY_TOP;
    for line in list.lines() {
        if y <= BOTTOM_MARGIN {
            pages.push(PageLayout::default());
            y = BODY_TOP;
        }
        if let Some(page) = pages.last_mut() {
            page.texts.push(PlacedText {
                text: line,
                x: BODY_X,
                y,
                size: BODY_SIZE,
                font: FontRole::Body,
            });
        }
        y -= LINE_HEIGHT;
    }

    if let Some(page) = pages.last_mut() {
        page.texts.push(PlacedText {
            text: CREDIT.to_string(),
            x: CREDIT_POS.0,
            y: CREDIT_POS.1,
            size: CREDIT_SIZE,
            font: FontRole::Credit,
        });
    }
    pages
}

/// Renders the list to PDF bytes. CPU bound; call from a blocking thread.
pub fn render_shopping_list(list: &ShoppingList, font: &BodyFont) -> anyhow::Result<Vec<u8>> {
    let pages = layout(list);
    let (doc, first_page, first_layer) =
        PdfDocument::new(TITLE, Mm::from(Pt(PAGE_WIDTH)), Mm::from(Pt(PAGE_HEIGHT)), "Layer 1");

    let body: IndirectFontRef = doc
        .add_external_font(Cursor::new(font.bytes()))
        .map_err(|e| anyhow!("failed to embed font: {e}"))?;
    let credit: IndirectFontRef = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("failed to load builtin font: {e}"))?;

    for (index, page) in pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm::from(Pt(PAGE_WIDTH)), Mm::from(Pt(PAGE_HEIGHT)), "Layer 1")
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for text in &page.texts {
            let font = match text.font {
                FontRole::Body => &body,
                FontRole::Credit => {
                    layer.set_fill_color(Color::Rgb(Rgb::new(1.0, 0.0, 0.0, None)));
                    &credit
                }
            };
            layer.use_text(
                text.text.as_str(),
                text.size,
                Mm::from(Pt(text.x)),
                Mm::from(Pt(text.y)),
                font,
            );
        }
    }

    doc.save_to_bytes()
        .map_err(|e| anyhow!("failed to write pdf: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopping_list::{ShoppingList, ShoppingListItem};

    fn list_of(n: usize) -> ShoppingList {
        ShoppingList {
            items: (0..n)
                .map(|i| ShoppingListItem {
                    name: format!("item {i:03}"),
                    total: i as i64 + 1,
                    measurement_unit: "g".into(),
                })
                .collect(),
        }
    }

    fn body_lines(page: &PageLayout) -> Vec<&PlacedText> {
        page.texts
            .iter()
            .filter(|t| t.font == FontRole::Body && t.text != TITLE)
            .collect()
    }

    #[test]
    fn empty_list_still_has_title_and_credit() {
        let pages = layout(&ShoppingList::default());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].texts.len(), 2);
        assert_eq!(pages[0].texts[0].text, TITLE);
        assert_eq!(pages[0].texts[1].text, CREDIT);
    }

    #[test]
    fn lines_step_down_from_the_top_offset() {
        let pages = layout(&list_of(3));
        let ys: Vec<f32> = body_lines(&pages[0]).iter().map(|t| t.y).collect();
        assert_eq!(ys, vec![700.0, 670.0, 640.0]);
        assert_eq!(body_lines(&pages[0])[0].text, "Item 000 1 g");
    }

    #[test]
    fn twenty_two_lines_fit_on_one_page() {
        let pages = layout(&list_of(22));
        assert_eq!(pages.len(), 1);
        assert_eq!(body_lines(&pages[0]).last().map(|t| t.y), Some(70.0));
    }

    #[test]
    fn overflow_starts_a_new_page_at_the_top() {
        let pages = layout(&list_of(23));
        assert_eq!(pages.len(), 2);
        let second = body_lines(&pages[1]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].y, BODY_TOP);
        assert_eq!(second[0].size, BODY_SIZE);
    }

    #[test]
    fn credit_only_on_the_last_page() {
        let pages = layout(&list_of(50));
        assert_eq!(pages.len(), 3);
        for page in &pages[..2] {
            assert!(page.texts.iter().all(|t| t.font != FontRole::Credit));
        }
        let last = pages[2].texts.last().unwrap();
        assert_eq!(last.text, CREDIT);
        assert_eq!((last.x, last.y), CREDIT_POS);
    }

    #[test]
    fn rejects_files_that_are_not_fonts() {
        assert!(BodyFont::from_bytes(b"<html>".to_vec()).is_err());
        assert!(BodyFont::from_bytes(Vec::new()).is_err());
        assert!(BodyFont::from_bytes(vec![0x00, 0x01, 0x00, 0x00, 0x00]).is_ok());
    }

    #[test]
    fn missing_font_file_is_an_error() {
        assert!(BodyFont::load(Path::new("/nonexistent/font.ttf")).is_err());
    }
}
