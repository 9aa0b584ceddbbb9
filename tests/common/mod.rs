#![allow(dead_code)]

use std::io::Write;

use harvest::reader::Reader;

/// Widths array text for a synthetic font: 500 for every code, 250 for the
/// space.
pub fn uniform_widths() -> String {
    (0..256)
        .map(|code| if code == 32 { "250" } else { "500" })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn obj(body: &str) -> Vec<u8> {
    body.as_bytes().to_vec()
}

/// A stream object body with a correct `/Length` and optional extra
/// dictionary entries (e.g. `/Filter /FlateDecode`).
pub fn stream_obj(dict_extra: &str, data: &[u8]) -> Vec<u8> {
    let mut out = format!("<< /Length {} {} >>\nstream\n", data.len(), dict_extra).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\nendstream");
    out
}

pub fn assemble(objects: &[(u32, Vec<u8>)], trailer: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n".to_vec();
    for (num, body) in objects {
        out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    out.extend_from_slice(format!("trailer\n{}\n%%EOF\n", trailer).as_bytes());
    out
}

/// A complete document: catalog, page tree with shared font resources and
/// media box, and one page per content fragment.
pub fn document_with(page_contents: &[&[u8]]) -> Vec<u8> {
    document_with_info("", page_contents)
}

pub fn document_with_info(info: &str, page_contents: &[&[u8]]) -> Vec<u8> {
    let mut objects: Vec<(u32, Vec<u8>)> = Vec::new();
    objects.push((1, obj("<< /Type /Catalog /Pages 2 0 R >>")));

    let kids: Vec<String> = (0..page_contents.len())
        .map(|i| format!("{} 0 R", 10 + i))
        .collect();
    objects.push((
        2,
        obj(&format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792]\n   /Resources << /Font << /F1 5 0 R >> >> >>",
            kids.join(" "),
            page_contents.len()
        )),
    ));
    objects.push((
        5,
        obj(&format!(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /FirstChar 0 /Widths [{}] >>",
            uniform_widths()
        )),
    ));

    for (i, content) in page_contents.iter().enumerate() {
        let page_num = 10 + i as u32;
        let content_num = 40 + i as u32;
        objects.push((
            page_num,
            obj(&format!(
                "<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>",
                content_num
            )),
        ));
        objects.push((content_num, stream_obj("", content)));
    }

    let trailer = if info.is_empty() {
        "<< /Root 1 0 R >>".to_string()
    } else {
        objects.push((8, obj(info)));
        "<< /Root 1 0 R /Info 8 0 R >>".to_string()
    };
    assemble(&objects, &trailer)
}

/// A one-page document whose font carries the given ToUnicode payload.
pub fn document_with_tounicode(cmap_payload: &str, content: &[u8]) -> Vec<u8> {
    let objects: Vec<(u32, Vec<u8>)> = vec![
        (1, obj("<< /Type /Catalog /Pages 2 0 R >>")),
        (
            2,
            obj(
                "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792]\n   /Resources << /Font << /F1 5 0 R >> >> >>",
            ),
        ),
        (3, obj("<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>")),
        (4, stream_obj("", content)),
        (
            5,
            obj(&format!(
                "<< /Type /Font /Subtype /Type1 /FirstChar 0 /Widths [{}] /ToUnicode 6 0 R >>",
                uniform_widths()
            )),
        ),
        (6, stream_obj("", cmap_payload.as_bytes())),
    ];
    assemble(&objects, "<< /Root 1 0 R >>")
}

pub fn flate(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("compress fixture");
    encoder.finish().expect("finish fixture")
}

pub fn reader_for(data: &[u8]) -> Reader {
    Reader::new(data).expect("failed to parse synthetic document")
}
