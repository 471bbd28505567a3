//! PDF access and extraction orchestration.

mod backend;
mod extractor;
mod options;

pub(crate) use backend::MAX_FORM_DEPTH;
pub use backend::{
    get_number_from_value, Annotation, BaseEncoding, ColorSpace, ContentOp, EmbeddedImage,
    FontEncoding, FontProgram, FontResource, FormXObject, ImageFilter, LopdfBackend, ObjectRef,
    PageGeometry, PdfBackend, PdfValue, ResourceScope, XObject,
};
pub use extractor::{DocumentExtractor, PageExtractor};
pub use options::{CancellationToken, ErrorMode, ExtractOptions, ProgressCallback};
