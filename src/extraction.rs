use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ocr::{self, OcrError};

/// Extensions routed through OCR rather than document parsing.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The one failure that is reported instead of degraded to empty text:
    /// the OCR engine itself is missing.
    #[error("tesseract OCR engine is not available: {0}")]
    OcrUnavailable(String),
}

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Extract plain text from a file, dispatching on its extension.
///
/// Library failures degrade to empty text: downstream analysis treats "no
/// text" as a well-defined user-visible error, which beats crashing the
/// request. The only error this returns is the missing-OCR-engine condition.
pub async fn extract_text(path: &Path) -> Result<String, ExtractionError> {
    let ext = extension_of(path);
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    info!("Attempting to extract text from: {} (type: {})", filename, ext);

    let text = match ext.as_str() {
        "pdf" => extract_pdf(path),
        "docx" => extract_docx(path),
        "xlsx" => extract_xlsx(path),
        _ if is_image_extension(&ext) => match ocr::extract_text_from_image(path).await {
            Ok(text) => text,
            Err(OcrError::EngineMissing(msg)) => {
                return Err(ExtractionError::OcrUnavailable(msg));
            }
            Err(e) => {
                warn!("OCR failed for {}: {}", filename, e);
                String::new()
            }
        },
        _ => read_plain_text(path),
    };

    let text = text.trim().to_string();
    info!("Extracted text length for {}: {} chars", filename, text.len());
    if !text.is_empty() {
        debug!(
            "Extracted text snippet (first 300 chars): {}",
            text.chars().take(300).collect::<String>()
        );
    } else if !is_image_extension(&ext) {
        warn!("No text could be extracted from {}", filename);
    }

    Ok(text)
}

/// Primary extraction via pdf-extract; if that yields no non-whitespace
/// text, take a second opinion from lopdf, whose content-stream walk has
/// different positioning tolerances. Both failing yields empty text.
fn extract_pdf(path: &Path) -> String {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read PDF {}: {}", path.display(), e);
            return String::new();
        }
    };

    // pdf-extract (via its font handling) can panic on malformed glyphs.
    let primary = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(&bytes)
    }));

    match primary {
        Ok(Ok(text)) if !text.trim().is_empty() => {
            info!("pdf-extract extraction successful for {}", path.display());
            return text;
        }
        Ok(Ok(_)) => {
            warn!(
                "pdf-extract found no text in {}; it may be image-based. Trying lopdf...",
                path.display()
            );
        }
        Ok(Err(e)) => {
            warn!("pdf-extract failed for {}: {}. Trying lopdf...", path.display(), e);
        }
        Err(_) => {
            warn!(
                "pdf-extract panicked on {} (likely malformed fonts). Trying lopdf...",
                path.display()
            );
        }
    }

    match extract_pdf_lopdf(&bytes) {
        Ok(text) if !text.trim().is_empty() => {
            info!("lopdf extraction successful for {}", path.display());
            text
        }
        Ok(_) => {
            warn!("lopdf also extracted no text from {}", path.display());
            String::new()
        }
        Err(e) => {
            warn!(
                "Both pdf-extract and lopdf failed for {}. Last error: {}",
                path.display(),
                e
            );
            String::new()
        }
    }
}

fn extract_pdf_lopdf(bytes: &[u8]) -> anyhow::Result<String> {
    let document = lopdf::Document::load_mem(bytes)?;
    let pages: Vec<u32> = document.get_pages().into_keys().collect();
    let text = document.extract_text(&pages)?;
    Ok(text)
}

/// Concatenates non-empty paragraph (and table-cell) runs.
fn extract_docx(path: &Path) -> String {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read DOCX {}: {}", path.display(), e);
            return String::new();
        }
    };

    let doc = match docx_rs::read_docx(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Error extracting from DOCX {}: {}", path.display(), e);
            return String::new();
        }
    };

    let mut lines: Vec<String> = Vec::new();
    for child in doc.document.children {
        collect_docx_text(&child, &mut lines);
    }

    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_docx_text(element: &docx_rs::DocumentChild, lines: &mut Vec<String>) {
    match element {
        docx_rs::DocumentChild::Paragraph(para) => {
            let mut line = String::new();
            for child in &para.children {
                paragraph_child_text(child, &mut line);
            }
            lines.push(line);
        }
        docx_rs::DocumentChild::Table(table) => {
            for row in &table.rows {
                let docx_rs::TableChild::TableRow(tr) = row;
                let mut cells: Vec<String> = Vec::new();
                for cell in &tr.cells {
                    let docx_rs::TableRowChild::TableCell(tc) = cell;
                    let mut cell_text = String::new();
                    for content in &tc.children {
                        if let docx_rs::TableCellContent::Paragraph(para) = content {
                            for child in &para.children {
                                paragraph_child_text(child, &mut cell_text);
                            }
                        }
                    }
                    cells.push(cell_text);
                }
                lines.push(cells.join("\t"));
            }
        }
        _ => {}
    }
}

fn paragraph_child_text(child: &docx_rs::ParagraphChild, out: &mut String) {
    match child {
        docx_rs::ParagraphChild::Run(run) => {
            for run_child in &run.children {
                if let docx_rs::RunChild::Text(text) = run_child {
                    out.push_str(&text.text);
                }
            }
        }
        docx_rs::ParagraphChild::Hyperlink(link) => {
            for nested in &link.children {
                if let docx_rs::ParagraphChild::Run(run) = nested {
                    for run_child in &run.children {
                        if let docx_rs::RunChild::Text(text) = run_child {
                            out.push_str(&text.text);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

/// Renders every sheet with a name header. A single failing sheet is logged
/// and replaced with a placeholder instead of sinking the whole file.
fn extract_xlsx(path: &Path) -> String {
    use calamine::{open_workbook, Reader, Xlsx};

    let mut workbook: Xlsx<_> = match open_workbook(path) {
        Ok(wb) => wb,
        Err(e) => {
            warn!("Error reading XLSX {}: {}", path.display(), e);
            return String::new();
        }
    };

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sections: Vec<String> = Vec::new();

    for sheet_name in &sheet_names {
        match workbook.worksheet_range(sheet_name) {
            Ok(range) => {
                let mut section = format!("--- Sheet: {} ---", sheet_name);
                for row in range.rows() {
                    let row_text: Vec<String> = row
                        .iter()
                        .map(|cell| cell.to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                    if !row_text.is_empty() {
                        section.push('\n');
                        section.push_str(&row_text.join(" | "));
                    }
                }
                sections.push(section);
            }
            Err(e) => {
                warn!(
                    "Could not read sheet '{}' in {}: {}",
                    sheet_name,
                    path.display(),
                    e
                );
                sections.push(format!("--- Sheet: {} (Error reading) ---", sheet_name));
            }
        }
    }

    sections.join("\n\n")
}

/// Best-effort read for unknown extensions, replacing invalid UTF-8.
fn read_plain_text(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).to_string();
            if !text.trim().is_empty() {
                info!("Read {} as plain text (fallback)", path.display());
            }
            text
        }
        Err(e) => {
            warn!("Could not read {} as plain text: {}", path.display(), e);
            String::new()
        }
    }
}
