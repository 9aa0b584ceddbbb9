use std::collections::HashMap;

use crate::cmap::{parse_cmap, CMap};
use crate::model::Object;
use crate::reader::Reader;

const DEFAULT_SPACE_WIDTH: f64 = 250.0;

/// Per-font metrics and decoding state, built once per page.
#[derive(Debug, Clone, Default)]
pub struct Font {
    pub base_font: String,
    pub cmap: CMap,
    /// Glyph widths in 1/1000 font units, keyed by character code.
    pub widths: HashMap<u32, f64>,
    pub missing_width: f64,
    pub space_width: f64,
    pub is_cid: bool,
}

impl Font {
    pub fn width(&self, code: u8) -> f64 {
        self.widths
            .get(&(code as u32))
            .copied()
            .unwrap_or(self.missing_width)
    }

    pub fn has_widths(&self) -> bool {
        !self.widths.is_empty()
    }
}

/// Builds the font table for a page from `/Resources/Font`.
pub fn load_page_fonts(reader: &Reader, page: &HashMap<String, Object>) -> HashMap<String, Font> {
    let mut out = HashMap::new();
    let resources = match page.get("Resources").map(|r| reader.resolve(r)) {
        Some(resources) => resources,
        None => return out,
    };
    let font_dict = match resources
        .as_dict()
        .and_then(|d| d.get("Font"))
        .and_then(|f| reader.resolve(f).as_dict())
    {
        Some(v) => v,
        None => return out,
    };
    for (name, font_obj) in font_dict {
        if let Some(dict) = reader.resolve(font_obj).as_dict() {
            out.insert(name.clone(), load_font(reader, dict));
        }
    }
    out
}

fn load_font(reader: &Reader, dict: &HashMap<String, Object>) -> Font {
    let mut font = Font {
        base_font: dict
            .get("BaseFont")
            .and_then(|v| reader.resolve(v).as_name())
            .unwrap_or_default()
            .to_string(),
        ..Font::default()
    };

    let first_char = dict
        .get("FirstChar")
        .and_then(|v| reader.resolve(v).as_i64());
    let widths_array = dict
        .get("Widths")
        .and_then(|v| reader.resolve(v).as_array());
    match (first_char, widths_array) {
        (Some(first), Some(widths)) => {
            for (i, w) in widths.iter().enumerate() {
                let code = first + i as i64;
                if code < 0 {
                    continue;
                }
                if let Some(value) = reader.resolve(w).as_f64() {
                    font.widths.insert(code as u32, value);
                }
            }
        }
        _ => {
            // TODO: Type0 width parsing via /DescendantFonts and /W; the
            // per-glyph heuristic advance covers these fonts for now.
            font.is_cid = true;
        }
    }

    font.space_width = font
        .widths
        .get(&32)
        .copied()
        .unwrap_or(DEFAULT_SPACE_WIDTH);

    if let Some(Object::Stream { data, .. }) = dict.get("ToUnicode").map(|v| reader.resolve(v)) {
        // A broken ToUnicode map degrades to byte-identity decoding.
        font.cmap = parse_cmap(data).unwrap_or_default();
    }

    font
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_with_fonts(font_objects: &str) -> Reader {
        let input = format!(
            "%PDF-1.7\n\
             1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
             2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
             3 0 obj\n<< /Type /Page /Resources << /Font << /F1 5 0 R >> >> >>\nendobj\n\
             {}\
             trailer\n<< /Root 1 0 R >>\n%%EOF\n",
            font_objects
        );
        Reader::new(input.as_bytes()).expect("reader")
    }

    fn font_table(font_objects: &str) -> HashMap<String, Font> {
        let reader = reader_with_fonts(font_objects);
        let page = reader.get_page(0).expect("page").clone();
        load_page_fonts(&reader, &page)
    }

    #[test]
    fn simple_font_widths_index_from_first_char() {
        let fonts = font_table(
            "5 0 obj\n<< /Type /Font /BaseFont /Helvetica /FirstChar 65 /Widths [100 200] >>\nendobj\n",
        );
        let font = fonts.get("F1").expect("F1");
        assert_eq!(font.base_font, "Helvetica");
        assert!(!font.is_cid);
        assert_eq!(font.width(65), 100.0);
        assert_eq!(font.width(66), 200.0);
        assert_eq!(font.width(67), 0.0, "missing width default");
        assert_eq!(font.space_width, 250.0, "no code 32 entry");
    }

    #[test]
    fn space_width_comes_from_code_32_when_present() {
        let fonts = font_table(
            "5 0 obj\n<< /Type /Font /FirstChar 31 /Widths [700 300 500] >>\nendobj\n",
        );
        let font = fonts.get("F1").expect("F1");
        assert_eq!(font.space_width, 300.0);
    }

    #[test]
    fn font_without_widths_is_cid() {
        let fonts = font_table(
            "5 0 obj\n<< /Type /Font /Subtype /Type0 /BaseFont /Noto >>\nendobj\n",
        );
        let font = fonts.get("F1").expect("F1");
        assert!(font.is_cid);
        assert!(!font.has_widths());
        assert_eq!(font.space_width, 250.0);
    }

    #[test]
    fn indirect_widths_array_is_resolved() {
        let fonts = font_table(
            "5 0 obj\n<< /Type /Font /FirstChar 65 /Widths 6 0 R >>\nendobj\n\
             6 0 obj\n[500]\nendobj\n",
        );
        let font = fonts.get("F1").expect("F1");
        assert_eq!(font.width(65), 500.0);
    }

    #[test]
    fn to_unicode_stream_is_parsed() {
        let payload = "beginbfchar <0041> <0042> endbfchar";
        let fonts = font_table(&format!(
            "5 0 obj\n<< /Type /Font /FirstChar 65 /Widths [500] /ToUnicode 6 0 R >>\nendobj\n\
             6 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            payload.len(),
            payload
        ));
        let font = fonts.get("F1").expect("F1");
        assert_eq!(font.cmap.lookup("0041"), Some("B"));
    }

    #[test]
    fn broken_to_unicode_degrades_to_empty_cmap() {
        let payload = "beginbfchar garbage endbfchar";
        let fonts = font_table(&format!(
            "5 0 obj\n<< /Type /Font /FirstChar 65 /Widths [500] /ToUnicode 6 0 R >>\nendobj\n\
             6 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            payload.len(),
            payload
        ));
        let font = fonts.get("F1").expect("F1");
        assert!(font.cmap.is_empty());
    }

    #[test]
    fn missing_resources_give_an_empty_table() {
        let reader = reader_with_fonts("5 0 obj\n<< /Type /Font >>\nendobj\n");
        let page: HashMap<String, Object> = HashMap::new();
        assert!(load_page_fonts(&reader, &page).is_empty());
    }
}
