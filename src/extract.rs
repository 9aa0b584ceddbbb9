use std::collections::HashMap;

use crate::content::{ContentStreamParser, Operation};
use crate::font::{load_page_fonts, Font};
use crate::lexer::LexError;
use crate::model::Object;
use crate::reader::Reader;

/// 3×3 affine transform stored as six elements with an implicit third
/// column of [0 0 1]. Points are row vectors: p' = p · M, so in a product
/// the right-hand factor is applied last.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    fn translate(tx: f64, ty: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: tx,
            f: ty,
        }
    }

    /// `self.multiply(other)` applies `other` first, then `self`.
    fn multiply(self, other: Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct GraphicsState {
    ctm: Matrix,
}

#[derive(Clone, Debug)]
struct TextState {
    font: Option<String>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horiz_scaling: f64,
    leading: f64,
    rise: f64,
    tm: Matrix,
    tlm: Matrix,
}

impl TextState {
    fn new() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scaling: 100.0,
            leading: 0.0,
            rise: 0.0,
            tm: Matrix::identity(),
            tlm: Matrix::identity(),
        }
    }
}

/// Interprets content-stream operations for one page, reconstructing
/// visual whitespace from glyph positions as it goes.
///
/// Only the text-relevant subset of the imaging model is interpreted;
/// every other operator is a no-op, which is exactly right for text
/// extraction.
pub struct Extractor {
    fonts: HashMap<String, Font>,
    gstate: GraphicsState,
    gstack: Vec<GraphicsState>,
    text: TextState,
    buffer: String,
    last_x: f64,
    last_y: f64,
}

impl Extractor {
    pub fn new(reader: &Reader, page: &HashMap<String, Object>) -> Extractor {
        Extractor::with_fonts(load_page_fonts(reader, page))
    }

    pub fn with_fonts(fonts: HashMap<String, Font>) -> Extractor {
        Extractor {
            fonts,
            gstate: GraphicsState {
                ctm: Matrix::identity(),
            },
            gstack: Vec::new(),
            text: TextState::new(),
            buffer: String::new(),
            last_x: 0.0,
            last_y: 0.0,
        }
    }

    /// Parses one decoded content stream and interprets every operation.
    /// Text accumulated before a mid-stream failure is kept.
    pub fn run(&mut self, data: &[u8]) -> Result<(), LexError> {
        let mut parser = ContentStreamParser::new(data);
        while let Some(op) = parser.next()? {
            self.process(&op);
        }
        Ok(())
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn into_text(self) -> String {
        self.buffer
    }

    /// End position of the previously shown glyph run, in user space.
    pub fn last_position(&self) -> (f64, f64) {
        (self.last_x, self.last_y)
    }

    pub fn process(&mut self, op: &Operation) {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => self.gstack.push(self.gstate),
            "Q" => {
                if let Some(prev) = self.gstack.pop() {
                    self.gstate = prev;
                }
            }
            "cm" => {
                if operands.len() == 6 {
                    let m = matrix_from_operands(operands);
                    self.gstate.ctm = self.gstate.ctm.multiply(m);
                }
            }
            "BT" => {
                self.text.tm = Matrix::identity();
                self.text.tlm = Matrix::identity();
            }
            "ET" => {}
            "Tc" => {
                if let Some(v) = operands.first() {
                    self.text.char_spacing = num(v);
                }
            }
            "Tw" => {
                if let Some(v) = operands.first() {
                    self.text.word_spacing = num(v);
                }
            }
            "Tz" => {
                if let Some(v) = operands.first() {
                    self.text.horiz_scaling = num(v);
                }
            }
            "TL" => {
                if let Some(v) = operands.first() {
                    self.text.leading = num(v);
                }
            }
            "Ts" => {
                if let Some(v) = operands.first() {
                    self.text.rise = num(v);
                }
            }
            "Tf" => {
                if operands.len() >= 2 {
                    if let Some(name) = operands[0].as_name() {
                        // An unknown resource name keeps the current font.
                        if self.fonts.contains_key(name) {
                            self.text.font = Some(name.to_string());
                        }
                    }
                    self.text.size = num(&operands[1]);
                }
            }
            "Td" => {
                if operands.len() == 2 {
                    let tx = num(&operands[0]);
                    let ty = num(&operands[1]);
                    self.translate_line(tx, ty);
                }
            }
            "TD" => {
                if operands.len() == 2 {
                    let tx = num(&operands[0]);
                    let ty = num(&operands[1]);
                    self.text.leading = -ty;
                    self.translate_line(tx, ty);
                }
            }
            "Tm" => {
                if operands.len() == 6 {
                    let m = matrix_from_operands(operands);
                    self.text.tm = m;
                    self.text.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(bytes) = operands.first().and_then(|o| o.as_string_bytes()) {
                    self.show_string(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::Number(n) => {
                                let shift = -n / 1000.0
                                    * self.text.size
                                    * (self.text.horiz_scaling / 100.0);
                                advance_matrix(&mut self.text.tm, shift);
                            }
                            _ => {
                                if let Some(bytes) = item.as_string_bytes() {
                                    self.show_string(bytes);
                                }
                            }
                        }
                    }
                }
            }
            "'" => {
                self.next_line();
                if let Some(bytes) = operands.first().and_then(|o| o.as_string_bytes()) {
                    self.show_string(bytes);
                }
            }
            "\"" => {
                if operands.len() >= 3 {
                    self.text.word_spacing = num(&operands[0]);
                    self.text.char_spacing = num(&operands[1]);
                    self.next_line();
                    if let Some(bytes) = operands[2].as_string_bytes() {
                        self.show_string(bytes);
                    }
                }
            }
            _ => {}
        }
    }

    fn translate_line(&mut self, tx: f64, ty: f64) {
        self.text.tlm = self.text.tlm.multiply(Matrix::translate(tx, ty));
        self.text.tm = self.text.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.text.leading;
        self.translate_line(0.0, -leading);
    }

    /// The show-string routine: locate the run, reconstruct whitespace,
    /// decode bytes, then advance the text matrix by the run's width.
    fn show_string(&mut self, raw: &[u8]) {
        let font = self
            .text
            .font
            .as_deref()
            .and_then(|name| self.fonts.get(name));
        let size = self.text.size;
        let scale = self.text.horiz_scaling / 100.0;

        // Start of the run in user space.
        let fm = self.gstate.ctm.multiply(self.text.tm);
        let (x, y) = (fm.e, fm.f);

        // A gap wider than half a space glyph reads as a word break; with
        // no usable space metric, fall back to a 0.2 em threshold.
        let space_width = font.map_or(0.0, |f| f.space_width / 1000.0 * size * scale);
        let threshold = if space_width > 0.0 {
            space_width * 0.5
        } else {
            size * 0.2
        };

        if (y - self.last_y).abs() > size * 0.5 {
            if !self.buffer.is_empty() {
                self.buffer.push('\n');
            }
        } else {
            let gap = x - self.last_x;
            if gap > threshold
                && !self.buffer.is_empty()
                && !self.buffer.ends_with('\n')
                && !self.buffer.ends_with(' ')
            {
                self.buffer.push(' ');
            }
        }

        let decoded = decode_string(font, raw);
        self.buffer.push_str(&decoded);

        let width_tx = match font {
            Some(font) if font.has_widths() => {
                let glyph_sum: f64 = raw.iter().map(|&b| font.width(b)).sum();
                let mut width = glyph_sum / 1000.0 * size;
                width += self.text.char_spacing * raw.len() as f64;
                let space_count = decoded.matches(' ').count();
                width += self.text.word_spacing * space_count as f64;
                width * scale
            }
            // Without metrics, half an em per decoded character keeps the
            // layout heuristics in a readable range.
            _ => decoded.chars().count() as f64 * size * 0.5 * scale,
        };

        self.last_x = x + width_tx;
        self.last_y = y;
        advance_matrix(&mut self.text.tm, width_tx);
    }
}

/// Greedy CMap decode: a two-byte key wins over a one-byte key; unmapped
/// bytes pass through as Latin-1. An empty CMap means pure Latin-1.
fn decode_string(font: Option<&Font>, raw: &[u8]) -> String {
    let cmap = match font {
        Some(font) if !font.cmap.is_empty() => &font.cmap,
        _ => return raw.iter().map(|&b| char::from(b)).collect(),
    };

    let mut out = String::new();
    let mut i = 0;
    while i < raw.len() {
        if i + 1 < raw.len() {
            let key = format!("{:04X}", ((raw[i] as u16) << 8) | raw[i + 1] as u16);
            if let Some(mapped) = cmap.lookup(&key) {
                out.push_str(mapped);
                i += 2;
                continue;
            }
        }
        let key = format!("{:04X}", raw[i]);
        if let Some(mapped) = cmap.lookup(&key) {
            out.push_str(mapped);
        } else {
            out.push(char::from(raw[i]));
        }
        i += 1;
    }
    out
}

/// Shifts a text matrix horizontally through its own orientation.
fn advance_matrix(m: &mut Matrix, amount: f64) {
    m.e += amount * m.a;
    m.f += amount * m.b;
}

/// Non-numeric operands read as zero, keeping matrix operators tolerant of
/// malformed input.
fn num(obj: &Object) -> f64 {
    obj.as_f64().unwrap_or(0.0)
}

fn matrix_from_operands(operands: &[Object]) -> Matrix {
    Matrix {
        a: num(&operands[0]),
        b: num(&operands[1]),
        c: num(&operands[2]),
        d: num(&operands[3]),
        e: num(&operands[4]),
        f: num(&operands[5]),
    }
}
