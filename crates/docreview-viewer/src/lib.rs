//! Document viewer: opens a document's bytes, counts and renders pages.
//!
//! Rendering is behind the [`PageRenderer`] capability; the pdfium backend is
//! gated behind the `pdfium` feature because it needs the native library.

mod error;
mod nav;
mod page;
mod render;

pub use error::ViewerError;
pub use nav::{next_page, page_label, previous_page};
pub use page::PageImage;
pub use render::{OpenDocument, PageRenderer};

#[cfg(feature = "pdfium")]
mod pdfium;
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRenderer;
