/*!
A crate for encoding drawing calls into PDF-like documents.

A [`PageEncoder`] implements [`Device`](folio_interpret::Device), so it can be driven by hand or
by the interpreter of `folio-interpret` to re-encode an existing page. Finished pages are added
to a [`Document`], which writes them out as a complete document.

The encoder works with a couple of simplifications:
- Paths are written in the space of the page, so the content stream doesn't need to keep track
  of transforms outside of strokes, images and shadings.
- Each layer only ever has a single clip. Setting a new clip restores the graphics state of
  the layer and replaces the old clip, so callers that want an intersection have to compute it
  themselves (the interpreter does so).
- Transparency layers and masks become transparency group XObjects that share the resource
  dictionary of their page.
- Gradients and meshes with transparent colours are drawn through a soft mask, since
  shadings can't carry an alpha channel.

## Example
```
use folio_interpret::color::{Color, ColorSpace};
use folio_interpret::{Device, FillRule, Paint};
use folio_write::{Document, EncoderSettings, PageEncoder};
use kurbo::{Rect, Shape};

let mut page = PageEncoder::new(Rect::new(0.0, 0.0, 100.0, 100.0), ColorSpace::device_rgb());
page.draw(
    &Rect::new(10.0, 10.0, 50.0, 50.0).to_path(0.1),
    FillRule::NonZero,
    &Paint::Color(Color::rgb(1.0, 0.0, 0.0)),
);

let mut document = Document::new(EncoderSettings::default());
document.add_page(page);
let data = document.data().unwrap();
assert!(data.starts_with(b"%PDF-1.3"));
```
*/

#![forbid(unsafe_code)]

mod color;
mod layer;
mod page;
mod path;
mod resources;
mod shading;
mod write;

use crate::page::EncodedPage;

pub use page::PageEncoder;
pub use pdf_writer::Date;

/// Settings for writing a document.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    /// Whether content and data streams are compressed with deflate.
    pub compress: bool,
    /// The producer that is written to the document information.
    pub producer: String,
    /// The creation date of the document.
    pub creation_date: Option<Date>,
    /// The date of the last modification of the document.
    pub modification_date: Option<Date>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            compress: true,
            producer: "folio".to_string(),
            creation_date: None,
            modification_date: None,
        }
    }
}

/// An error that can occur while writing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The colour space of a page is not DeviceGray, DeviceRGB, DeviceCMYK or ICC-based.
    #[error("the colour space of a page is not supported")]
    UnsupportedColorSpace,
    /// A page box is not finite, or the media box is empty.
    #[error("a page has an invalid page box")]
    InvalidPageBox,
    /// The document doesn't have any pages.
    #[error("the document has no pages")]
    Empty,
}

/// A document that is assembled page by page.
pub struct Document {
    settings: EncoderSettings,
    pages: Vec<EncodedPage>,
}

impl Document {
    /// Create a new, empty document.
    pub fn new(settings: EncoderSettings) -> Self {
        Self {
            settings,
            pages: vec![],
        }
    }

    /// Finish a page and add it to the end of the document.
    pub fn add_page(&mut self, page: PageEncoder) {
        self.pages.push(page.finish());
    }

    /// The number of pages added so far.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no page has been added yet.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Write the document.
    pub fn data(&self) -> Result<Vec<u8>, EncodeError> {
        write::write_document(&self.settings, &self.pages)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("settings", &self.settings)
            .field("pages", &self.pages.len())
            .finish()
    }
}
