//! pdfium-backed renderer.

use std::path::Path;

use pdfium_render::prelude::*;
use tracing::{debug, warn};

use crate::{OpenDocument, PageImage, PageRenderer, ViewerError};

/// Renders PDF pages with pdfium.
///
/// The pdfium shared library is looked up next to the given directory first,
/// then on the system library path.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    pub fn bind(library_dir: &Path) -> Result<Self, ViewerError> {
        let bindings =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(library_dir))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| ViewerError::Library(e.to_string()))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PageRenderer for PdfiumRenderer {
    fn open<'a>(&'a self, bytes: Vec<u8>) -> Result<Box<dyn OpenDocument + 'a>, ViewerError> {
        let len = bytes.len();
        let document = self
            .pdfium
            .load_pdf_from_byte_vec(bytes, None)
            .map_err(|e| {
                warn!(bytes = len, error = %e, "pdfium could not parse document");
                ViewerError::UnreadableDocument(e.to_string())
            })?;
        debug!(bytes = len, pages = document.pages().len(), "opened document");
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl OpenDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        usize::try_from(self.document.pages().len()).unwrap_or(0)
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<PageImage, ViewerError> {
        let page_count = self.page_count();
        let out_of_range = || ViewerError::PageIndexOutOfRange { index, page_count };
        if index >= page_count {
            return Err(out_of_range());
        }
        let page_index = PdfPageIndex::try_from(index).map_err(|_| out_of_range())?;
        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|e| ViewerError::Render(e.to_string()))?;

        let bitmap = page
            .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(scale))
            .map_err(|e| ViewerError::Render(e.to_string()))?;
        let rgba = bitmap.as_image().to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!(index, width, height, scale, "rendered page");
        PageImage::from_rgba(width, height, rgba.into_raw())
    }
}
