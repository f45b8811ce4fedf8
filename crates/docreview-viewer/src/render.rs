use crate::{PageImage, ViewerError};

/// Turns document bytes into an [`OpenDocument`].
pub trait PageRenderer {
    /// Parse a document. Fails with [`ViewerError::UnreadableDocument`] if the
    /// bytes are not a valid document.
    fn open<'a>(&'a self, bytes: Vec<u8>) -> Result<Box<dyn OpenDocument + 'a>, ViewerError>;
}

/// A parsed document, held for as long as it is being viewed.
pub trait OpenDocument {
    fn page_count(&self) -> usize;

    /// Render page `index` (0-based), scaled by `scale` relative to the page's
    /// natural size. Fails with [`ViewerError::PageIndexOutOfRange`] outside
    /// `0..page_count()`.
    fn render_page(&self, index: usize, scale: f32) -> Result<PageImage, ViewerError>;
}
