use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::time::Instant;

use rayon::prelude::*;

use crate::extract::Extractor;
use crate::model::{Document, Metadata, Object, Page};
use crate::reader::{Reader, ReaderError};

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Reader(ReaderError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "{}", err),
            LoadError::Reader(err) => write!(f, "failed to create pdf reader: {}", err),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err)
    }
}

impl From<ReaderError> for LoadError {
    fn from(err: ReaderError) -> Self {
        LoadError::Reader(err)
    }
}

/// Reads a PDF file and extracts the full document record, page by page.
pub fn load_document(path: &str) -> Result<Document, LoadError> {
    let data = fs::read(path)?;
    let reader = Reader::new(&data)?;
    Ok(extract_document(&reader))
}

/// Same as [`load_document`], with per-page extraction fanned out over a
/// bounded worker pool. `workers == 0` picks a default from the available
/// hardware parallelism.
pub fn load_document_concurrent(path: &str, workers: usize) -> Result<Document, LoadError> {
    let data = fs::read(path)?;
    let reader = Reader::new(&data)?;
    Ok(extract_document_concurrent(&reader, workers))
}

pub fn extract_document(reader: &Reader) -> Document {
    let num_pages = reader.num_pages();
    eprintln!("Processing {} pages...", num_pages);
    let mut pages = Vec::with_capacity(num_pages as usize);
    for index in 0..num_pages {
        if let Some(page) = extract_page(reader, index) {
            pages.push(page);
        }
    }
    Document {
        metadata: build_metadata(reader),
        pages,
    }
}

pub fn extract_document_concurrent(reader: &Reader, workers: usize) -> Document {
    let num_pages = reader.num_pages();
    eprintln!("Processing {} pages...", num_pages);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build();
    let pages: Vec<Option<Page>> = match pool {
        Ok(pool) => pool.install(|| {
            (0..num_pages)
                .into_par_iter()
                .map(|index| extract_page(reader, index))
                .collect()
        }),
        Err(err) => {
            eprintln!("Falling back to sequential processing: {}", err);
            (0..num_pages).map(|index| extract_page(reader, index)).collect()
        }
    };
    Document {
        metadata: build_metadata(reader),
        // Skipped pages drop out; the rest keep their original order.
        pages: pages.into_iter().flatten().collect(),
    }
}

/// Extracts one page record. Any per-page failure is reported on the
/// diagnostic channel and skips just that page.
fn extract_page(reader: &Reader, index: u32) -> Option<Page> {
    let start = Instant::now();
    let page = match reader.get_page(index) {
        Ok(page) => page,
        Err(err) => {
            eprintln!("Error getting page {}: {}", index + 1, err);
            return None;
        }
    };

    let mut extractor = Extractor::new(reader, page);
    for data in page_content_streams(reader, page) {
        if let Err(err) = extractor.run(data) {
            eprintln!("Error extracting text from page {}: {}", index + 1, err);
            return None;
        }
    }

    let (width, height) = page_dimensions(reader, page);
    let content = extractor.into_text();
    let char_count = content.chars().count();
    eprintln!(
        "Page {} processed in {:?} ({} chars)",
        index + 1,
        start.elapsed(),
        char_count
    );
    Some(Page {
        page_number: index + 1,
        content,
        char_count,
        width,
        height,
    })
}

/// `/Contents` is either one stream or an array of streams interpreted in
/// order through the same extractor.
fn page_content_streams<'a>(
    reader: &'a Reader,
    page: &'a HashMap<String, Object>,
) -> Vec<&'a [u8]> {
    let contents = match page.get("Contents") {
        Some(contents) => reader.resolve(contents),
        None => return Vec::new(),
    };
    let mut out = Vec::new();
    match contents {
        Object::Stream { data, .. } => out.push(data.as_slice()),
        Object::Array(items) => {
            for item in items {
                if let Object::Stream { data, .. } = reader.resolve(item) {
                    out.push(data.as_slice());
                }
            }
        }
        _ => {}
    }
    out
}

fn page_dimensions(reader: &Reader, page: &HashMap<String, Object>) -> (f64, f64) {
    let media_box = page
        .get("MediaBox")
        .map(|v| reader.resolve(v))
        .and_then(|v| v.as_array());
    match media_box {
        // [x1 y1 x2 y2] with the lower-left corner assumed at the origin.
        Some(entries) if entries.len() == 4 => (
            entries[2].as_f64().unwrap_or(0.0),
            entries[3].as_f64().unwrap_or(0.0),
        ),
        _ => (0.0, 0.0),
    }
}

fn build_metadata(reader: &Reader) -> Metadata {
    let mut meta = Metadata {
        encrypted: reader.is_encrypted(),
        ..Metadata::default()
    };
    if let Some(info) = reader.get_info() {
        meta.title = info_string(reader, info, "Title");
        meta.author = info_string(reader, info, "Author");
        meta.creator = info_string(reader, info, "Creator");
        meta.producer = info_string(reader, info, "Producer");
    }
    meta
}

fn info_string(reader: &Reader, info: &HashMap<String, Object>, key: &str) -> String {
    info.get(key)
        .map(|v| reader.resolve(v))
        .and_then(|v| v.as_string_bytes())
        .map(text_string)
        .unwrap_or_default()
}

/// PDF text strings are UTF-16BE when they open with a BOM, else treated
/// as Latin-1.
fn text_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| char::from(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_string_detects_the_utf16_bom() {
        assert_eq!(text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x20, 0x19]), "A\u{2019}");
        assert_eq!(text_string(b"plain"), "plain");
        assert_eq!(text_string(&[0xC9, 0x74, 0xE9]), "Été");
    }

    #[test]
    fn media_box_reads_upper_corner_as_dimensions() {
        let input = b"%PDF-1.7\n\
            1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
            2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
            3 0 obj\n<< /Type /Page /MediaBox [5 10 612 792] >>\nendobj\n\
            trailer\n<< /Root 1 0 R >>\n%%EOF\n";
        let reader = Reader::new(input).expect("reader");
        let page = reader.get_page(0).expect("page");
        // The lower-left corner is ignored, not subtracted.
        assert_eq!(page_dimensions(&reader, page), (612.0, 792.0));
    }

    #[test]
    fn missing_media_box_gives_zero_dimensions() {
        let page = HashMap::new();
        let input = b"%PDF-1.7\n\
            1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
            2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
            trailer\n<< /Root 1 0 R >>\n%%EOF\n";
        let reader = Reader::new(input).expect("reader");
        assert_eq!(page_dimensions(&reader, &page), (0.0, 0.0));
    }
}
