//! Document rendering: lays out a [`Book`] and encodes it as PDF.

pub mod layout;
pub mod pdf;

use tracing::info;

use crate::book::Book;
use crate::contract::BookRenderer;

pub use layout::{layout_book, DocumentLayout, PageGeometry, TocEntry};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid page geometry: {0}")]
    Geometry(String),

    #[error("render task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Options for the PDF renderer.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub geometry: PageGeometry,
    /// Printed under the title on the title page when set.
    pub author: Option<String>,
}

/// [`BookRenderer`] producing PDF with a title page, chapter pages and a
/// trailing table of contents.
#[derive(Debug, Clone, Default)]
pub struct PdfBookRenderer {
    options: RenderOptions,
}

impl PdfBookRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl BookRenderer for PdfBookRenderer {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, title: &str, book: &Book) -> Result<Vec<u8>, RenderError> {
        let geometry = self.options.geometry;
        if geometry.text_width_pt() <= 0.0 || geometry.height_mm <= 2.0 * geometry.margin_mm {
            return Err(RenderError::Geometry(format!(
                "margins of {} mm leave no room on a {}x{} mm page",
                geometry.margin_mm, geometry.width_mm, geometry.height_mm
            )));
        }
        let layout = layout_book(geometry, title, self.options.author.as_deref(), book);
        info!(
            pages = layout.pages.len(),
            chapters = layout.toc.len(),
            "Laid out book"
        );
        Ok(pdf::encode_pdf(title, geometry, &layout))
    }
}
