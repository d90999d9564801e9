use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[cfg(feature = "ocr")]
use image::GrayImage;
#[cfg(feature = "ocr")]
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
#[cfg(feature = "ocr")]
use imageproc::filter::median_filter;
#[cfg(feature = "ocr")]
use tesseract::{PageSegMode, Tesseract};

/// OCR results shorter than this trigger a retry with automatic page
/// segmentation.
pub const MIN_REASONABLE_TEXT_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum OcrError {
    /// Distinct from an empty result: the engine itself is absent or
    /// unusable, and the caller should say so instead of reporting "no text".
    #[error("tesseract OCR engine is not available: {0}")]
    EngineMissing(String),

    #[error("could not read image: {0}")]
    UnreadableImage(String),

    #[error("OCR failed: {0}")]
    Recognition(String),
}

#[cfg(feature = "ocr")]
pub async fn extract_text_from_image(file_path: &Path) -> Result<String, OcrError> {
    let path = file_path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&path))
        .await
        .map_err(|e| OcrError::Recognition(e.to_string()))?
}

#[cfg(not(feature = "ocr"))]
pub async fn extract_text_from_image(_file_path: &Path) -> Result<String, OcrError> {
    Err(OcrError::EngineMissing(
        "server was built without the ocr feature".to_string(),
    ))
}

#[cfg(feature = "ocr")]
fn extract_blocking(path: &Path) -> Result<String, OcrError> {
    let img = image::open(path).map_err(|e| OcrError::UnreadableImage(e.to_string()))?;
    let gray = img.to_luma8();

    let prepared = match preprocess(&gray) {
        Ok(prepared) => prepared,
        Err(e) => {
            warn!(
                "Preprocessing failed for {} ({}), attempting OCR on plain grayscale image",
                path.display(),
                e
            );
            gray
        }
    };

    let png = encode_png(&prepared)?;

    // Assume a single uniform text block first; fall back to automatic page
    // segmentation when the result looks too thin.
    let mut text = run_tesseract(&png, PageSegMode::PsmSingleBlock)?;
    if text.len() < MIN_REASONABLE_TEXT_LEN {
        warn!(
            "OCR with single-block segmentation yielded {} chars for {}, retrying with auto segmentation",
            text.len(),
            path.display()
        );
        text = run_tesseract(&png, PageSegMode::PsmAuto)?;
    }

    if text.is_empty() {
        warn!("Final OCR attempt yielded no text for {}", path.display());
    } else {
        info!("OCR extracted {} chars from {}", text.len(), path.display());
    }

    Ok(text)
}

/// Grayscale, median-blur to denoise, then Otsu binarization.
#[cfg(feature = "ocr")]
fn preprocess(gray: &GrayImage) -> anyhow::Result<GrayImage> {
    if gray.width() == 0 || gray.height() == 0 {
        anyhow::bail!("image has zero dimensions");
    }
    let denoised = median_filter(gray, 1, 1);
    let level = otsu_level(&denoised);
    Ok(threshold(&denoised, level, ThresholdType::Binary))
}

#[cfg(feature = "ocr")]
fn encode_png(img: &GrayImage) -> Result<Vec<u8>, OcrError> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| OcrError::Recognition(e.to_string()))?;
    Ok(buf)
}

#[cfg(feature = "ocr")]
fn run_tesseract(png: &[u8], psm: PageSegMode) -> Result<String, OcrError> {
    let temp_path = std::env::temp_dir().join(format!(
        "medreport_ocr_{}_{}.png",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));
    std::fs::write(&temp_path, png).map_err(|e| OcrError::Recognition(e.to_string()))?;

    let result = (|| {
        let mut tesseract = Tesseract::new(None, Some("eng"))
            .map_err(|e| OcrError::EngineMissing(e.to_string()))?;
        let temp_str = temp_path
            .to_str()
            .ok_or_else(|| OcrError::Recognition("non-UTF8 temp path".to_string()))?;
        tesseract = tesseract
            .set_image(temp_str)
            .map_err(|e| OcrError::Recognition(e.to_string()))?;
        tesseract.set_page_seg_mode(psm);
        let text = tesseract
            .get_text()
            .map_err(|e| OcrError::Recognition(e.to_string()))?;
        Ok(text.trim().to_string())
    })();

    let _ = std::fs::remove_file(&temp_path);
    result
}
