//! Page rendering using pdfium-render.
//!
//! PDFium is loaded dynamically at runtime; the crate builds without it and
//! callers fall back to the native backend when binding fails.

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;

use super::{scaled_dimensions, PageRenderer, PageSize, PageSource};
use crate::error::{Error, Result};

/// A bound PDFium library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    /// Bind libpdfium from the working directory, then the system library path.
    pub fn bind() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| Error::Backend(format!("failed to load PDFium library: {:?}", e)))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Open a document; it borrows the engine for its lifetime.
    pub fn open(&self, path: &Path) -> Result<PdfiumDocument<'_>> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| Error::DocumentOpen {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(PdfiumDocument { document })
    }
}

/// A PDF opened through PDFium.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    fn page(&self, index: usize) -> Result<PdfPage<'_>> {
        let count = self.page_count();
        if index >= count {
            return Err(Error::PageOutOfRange { index, count });
        }
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| Error::Render {
                page: index,
                reason: format!("page access failed: {}", e),
            })
    }
}

impl PageSource for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<PageSize> {
        let page = self.page(index)?;
        Ok(PageSize::new(page.width().value, page.height().value))
    }
}

impl PageRenderer for PdfiumDocument<'_> {
    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage> {
        let page = self.page(index)?;
        let size = PageSize::new(page.width().value, page.height().value);
        let (width, height) = scaled_dimensions(size, scale);

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| Error::Render {
                page: index,
                reason: e.to_string(),
            })?;

        Ok(bitmap.as_image())
    }
}
