use crate::extraction::{extract_text, is_image_extension};
use std::io::Write;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(bytes).unwrap();
    path
}

#[tokio::test]
async fn test_extract_text_from_txt() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "report.txt", b"Patient presents with mild fever.\n");

    let text = extract_text(&path).await.unwrap();
    assert_eq!(text, "Patient presents with mild fever.");
}

#[tokio::test]
async fn test_extract_text_trims_whitespace() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "notes.csv", b"\n\n  value,42  \n\n");

    let text = extract_text(&path).await.unwrap();
    assert_eq!(text, "value,42");
}

#[tokio::test]
async fn test_corrupt_pdf_degrades_to_empty_text() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "broken.pdf", b"%PDF-1.4 this is not a real pdf body");

    // Parsing failures are not surfaced as errors; the caller sees "no text".
    let text = extract_text(&path).await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn test_corrupt_docx_degrades_to_empty_text() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "broken.docx", b"not a zip archive");

    let text = extract_text(&path).await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn test_corrupt_xlsx_degrades_to_empty_text() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "broken.xlsx", b"not a workbook");

    let text = extract_text(&path).await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn test_unknown_extension_reads_lossy_utf8() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "report.dat", b"valid text \xff\xfe with junk bytes");

    let text = extract_text(&path).await.unwrap();
    assert!(text.starts_with("valid text"));
    assert!(text.contains("with junk bytes"));
}

#[tokio::test]
async fn test_missing_file_degrades_to_empty_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("never_written.txt");

    let text = extract_text(&path).await.unwrap();
    assert_eq!(text, "");
}

#[test]
fn test_image_extension_routing() {
    for ext in ["png", "jpg", "jpeg", "bmp", "tiff", "tif"] {
        assert!(is_image_extension(ext), "{} should route to OCR", ext);
    }
    assert!(!is_image_extension("pdf"));
    assert!(!is_image_extension("webp"));
}
