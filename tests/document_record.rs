mod common;

use harvest::loader::extract_document;

use crate::common::{assemble, document_with, document_with_info, obj, reader_for};

#[test]
fn metadata_strings_decode_from_both_encodings() {
    let data = document_with_info(
        "<< /Title (Annual Report) /Author <FEFF0041> /Producer (G\\351n\\351rateur) >>",
        &[b"BT /F1 12 Tf 0 0 Td (x) Tj ET"],
    );
    let doc = extract_document(&reader_for(&data));

    assert_eq!(doc.metadata.title, "Annual Report");
    assert_eq!(doc.metadata.author, "A", "UTF-16BE with BOM");
    assert_eq!(doc.metadata.producer, "Générateur", "octal escapes as Latin-1");
    assert_eq!(doc.metadata.creator, "");
    assert!(!doc.metadata.encrypted);
}

#[test]
fn empty_metadata_fields_are_omitted_from_json() {
    let data = document_with_info(
        "<< /Title (Only Title) >>",
        &[b"BT /F1 12 Tf 0 0 Td (x) Tj ET"],
    );
    let doc = extract_document(&reader_for(&data));
    let value = serde_json::to_value(&doc).unwrap();
    let metadata = value["metadata"].as_object().unwrap();

    assert_eq!(metadata["title"], "Only Title");
    assert!(!metadata.contains_key("author"));
    assert!(!metadata.contains_key("creator"));
    assert!(!metadata.contains_key("producer"));
    assert_eq!(metadata["encrypted"], false);
}

#[test]
fn record_shape_matches_the_contract() {
    let data = document_with(&[b"BT /F1 12 Tf 0 0 Td (hi) Tj ET"]);
    let doc = extract_document(&reader_for(&data));
    let value = serde_json::to_value(&doc).unwrap();

    let page = value["pages"][0].as_object().unwrap();
    for key in ["page_number", "content", "char_count", "width", "height"] {
        assert!(page.contains_key(key), "missing key {}", key);
    }
    assert_eq!(page["page_number"], 1);
    assert_eq!(page["content"], "hi");
    assert_eq!(page["char_count"], 2);
}

#[test]
fn json_uses_two_space_indent_without_html_escaping() {
    let data = document_with(&[b"BT /F1 12 Tf 0 0 Td (<b> & </b>) Tj ET"]);
    let doc = extract_document(&reader_for(&data));
    let pretty = serde_json::to_string_pretty(&doc).unwrap();

    assert!(pretty.starts_with("{\n  \"metadata\""), "two-space indent");
    assert!(
        pretty.contains("\"content\": \"<b> & </b>\""),
        "angle brackets and ampersands stay literal: {}",
        pretty
    );
}

#[test]
fn char_count_counts_unicode_scalar_values() {
    let data = document_with(&[b"BT /F1 12 Tf 0 0 Td (caf\\351) Tj ET"]);
    let doc = extract_document(&reader_for(&data));
    let page = &doc.pages[0];

    assert_eq!(page.content, "caf\u{e9}");
    assert_eq!(page.char_count, 4);
    assert_eq!(page.content.len(), 5, "UTF-8 length differs");
}

#[test]
fn encrypt_entry_is_reported_in_metadata() {
    let objects = vec![
        (1, obj("<< /Type /Catalog /Pages 2 0 R >>")),
        (2, obj("<< /Type /Pages /Kids [] /Count 0 >>")),
    ];
    let data = assemble(&objects, "<< /Root 1 0 R /Encrypt 9 0 R >>");
    let doc = extract_document(&reader_for(&data));
    assert!(doc.metadata.encrypted);
}
