use std::path::PathBuf;

use image::GrayImage;

/// Frame acquisition seam. The real device capture lives outside the
/// core; the core only asks for one frame at a time.
pub trait Camera: Send + Sync {
    /// A captured frame, or `None` when capture fails.
    fn capture(&self) -> Option<GrayImage>;
}

/// File-backed camera for bench setups and tests: re-reads a still image
/// on every capture.
pub struct StillCamera {
    source: PathBuf,
}

impl StillCamera {
    pub fn new(source: PathBuf) -> Self {
        Self { source }
    }
}

impl Camera for StillCamera {
    fn capture(&self) -> Option<GrayImage> {
        match image::open(&self.source) {
            Ok(img) => Some(img.to_luma8()),
            Err(e) => {
                log::warn!("capture from {} failed: {e}", self.source.display());
                None
            }
        }
    }
}

/// Placeholder when no capture source is configured.
pub struct NoCamera;

impl Camera for NoCamera {
    fn capture(&self) -> Option<GrayImage> {
        log::warn!("capture requested but no camera source is configured");
        None
    }
}
