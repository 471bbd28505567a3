//! Document model types.
//!
//! [`Document`], [`Page`] and [`ImageResult`] form the report handed to the
//! sink. [`Bitmap`] is the internal pixel buffer passed between the
//! rasterizer, the checkbox detector and the OCR engine.

mod bitmap;
mod document;
mod page;

pub use bitmap::Bitmap;
pub use document::{Document, Metadata};
pub use page::{ImageResult, Page};
