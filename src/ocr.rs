use image::GrayImage;

/// Text extraction seam for frames that carry no QR symbol.
pub trait Ocr: Send + Sync {
    fn extract_lines(&self, frame: &GrayImage) -> Vec<String>;
}

/// Placeholder engine; always reports no text.
pub struct NullOcr;

impl Ocr for NullOcr {
    fn extract_lines(&self, _frame: &GrayImage) -> Vec<String> {
        Vec::new()
    }
}
