use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("unreadable document: {0}")]
    UnreadableDocument(String),

    #[error("page {index} out of range (document has {page_count} pages)")]
    PageIndexOutOfRange { index: usize, page_count: usize },

    #[error("render failed: {0}")]
    Render(String),

    #[error("pdf library unavailable: {0}")]
    Library(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
