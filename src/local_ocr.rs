//! Local OCR fallback: image cleanup, PDF rasterization, Tesseract CLI.

use crate::config::{ExtractorConfig, TesseractConfig};
use crate::error::{ExtractionError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, RgbaImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use pdfium_render::prelude::*;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

/// Radius of the square structuring element used to remove specks.
const MORPHOLOGY_RADIUS: u8 = 1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalOcrOutput {
    pub text: String,
    pub page_count: usize,
}

/// Grayscale, Otsu binarization, then open and close to drop isolated
/// noise pixels without eroding glyph strokes.
pub fn preprocess_image(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let level = otsu_level(&gray);
    let binary = threshold(&gray, level, ThresholdType::Binary);
    let opened = open(&binary, Norm::LInf, MORPHOLOGY_RADIUS);
    close(&opened, Norm::LInf, MORPHOLOGY_RADIUS)
}

/// Run the Tesseract CLI on one preprocessed page. The page is written to a
/// temporary PNG in `scratch_dir` that is removed on every exit path.
fn tesseract_page(
    page: &GrayImage,
    config: &TesseractConfig,
    scratch_dir: &Path,
) -> Result<String> {
    let temp = tempfile::Builder::new()
        .prefix("lab-scan-")
        .suffix(".png")
        .tempfile_in(scratch_dir)?;
    page.save_with_format(temp.path(), ImageFormat::Png)?;

    let output = Command::new(&config.path)
        .arg(temp.path())
        .arg("stdout")
        .arg("-l")
        .arg(&config.lang)
        .arg("--psm")
        .arg(config.psm.to_string())
        .output();

    let temp_path = temp.path().to_path_buf();
    if let Err(e) = temp.close() {
        warn!(path = %temp_path.display(), error = %e, "could not remove temporary image");
    }

    let output = output.map_err(|e| {
        ExtractionError::OcrEngine(format!(
            "Failed to run tesseract (is it installed? path='{}'): {}",
            config.path, e
        ))
    })?;
    if !output.status.success() {
        return Err(ExtractionError::OcrEngine(format!(
            "tesseract exited with code {}: {}",
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

fn bind_pdfium(config: &ExtractorConfig) -> Result<Pdfium> {
    let bindings = match &config.pdfium_library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            .or_else(|_| Pdfium::bind_to_system_library()),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractionError::Pdf(format!("Could not find PDFium library: {}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Render every page of a PDF at `pdf_render_scale`.
pub fn rasterize_pdf(bytes: &[u8], config: &ExtractorConfig) -> Result<Vec<DynamicImage>> {
    let pdfium = bind_pdfium(config)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ExtractionError::Pdf(format!("Failed to load PDF: {}", e)))?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(config.pdf_render_scale);
    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ExtractionError::Pdf(format!("Failed to render page {}: {}", index + 1, e))
        })?;
        let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
        let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
            ExtractionError::Pdf(format!("Page {} produced a malformed bitmap", index + 1))
        })?;
        pages.push(DynamicImage::ImageRgba8(rgba));
    }
    if pages.is_empty() {
        return Err(ExtractionError::Pdf("PDF has no pages".to_string()));
    }
    debug!(pages = pages.len(), scale = config.pdf_render_scale, "rasterized PDF");
    Ok(pages)
}

pub fn ocr_image(bytes: &[u8], config: &ExtractorConfig) -> Result<LocalOcrOutput> {
    let image = image::load_from_memory(bytes)?;
    let scratch_dir = std::env::temp_dir();
    let text = tesseract_page(&preprocess_image(&image), &config.tesseract, &scratch_dir)?;
    info!(chars = text.len(), "local OCR finished");
    Ok(LocalOcrOutput { text, page_count: 1 })
}

pub fn ocr_pdf(bytes: &[u8], config: &ExtractorConfig) -> Result<LocalOcrOutput> {
    let pages = rasterize_pdf(bytes, config)?;
    let scratch_dir = std::env::temp_dir();
    let mut texts = Vec::with_capacity(pages.len());
    for (index, page) in pages.iter().enumerate() {
        let text = tesseract_page(&preprocess_image(page), &config.tesseract, &scratch_dir)?;
        debug!(page = index + 1, chars = text.len(), "page recognised");
        texts.push(text);
    }
    let text = texts.join("\n");
    info!(pages = pages.len(), chars = text.len(), "local OCR finished");
    Ok(LocalOcrOutput {
        text,
        page_count: pages.len(),
    })
}

/// Local OCR for an image or PDF upload.
pub fn run_local_ocr(
    bytes: &[u8],
    is_pdf: bool,
    config: &ExtractorConfig,
) -> Result<LocalOcrOutput> {
    if is_pdf {
        ocr_pdf(bytes, config)
    } else {
        ocr_image(bytes, config)
    }
}
