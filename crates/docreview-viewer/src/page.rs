use std::path::Path;

use image::{ImageFormat, RgbaImage};

use crate::ViewerError;

/// A rendered page as an owned RGBA8 buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl PageImage {
    /// Wrap a row-major RGBA8 buffer; its length must be `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, ViewerError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ViewerError::Render(format!(
                "bitmap is {} bytes, expected {expected} for {width}x{height}",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn save_png(&self, path: &Path) -> Result<(), ViewerError> {
        let img = RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .ok_or_else(|| ViewerError::Render("bitmap size mismatch".into()))?;
        img.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}
