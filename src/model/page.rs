//! Page-level types.

use serde::{Deserialize, Serialize};

/// A single extracted page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub page_number: u32,

    /// Raw text from the page's text layer (may be empty)
    pub text: String,

    /// OCR results for the page's embedded images, in enumeration order
    pub images: Vec<ImageResult>,
}

impl Page {
    /// Create a page with no images.
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
            images: Vec::new(),
        }
    }

    /// Append the OCR result for the next embedded image.
    ///
    /// The image index is assigned from the insertion position, so indices
    /// stay contiguous from 1.
    pub fn add_image(&mut self, ocr_text: impl Into<String>) -> &ImageResult {
        let index = self.images.len() as u32 + 1;
        self.images.push(ImageResult {
            index,
            ocr_text: ocr_text.into(),
        });
        &self.images[self.images.len() - 1]
    }

    /// Number of embedded images on the page.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Check whether the page has neither text nor images.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }
}

/// OCR output for one embedded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    /// Position within the page (1-indexed)
    pub index: u32,

    /// Recognized text (may be empty)
    pub ocr_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_new() {
        let page = Page::new(1, "Name: ____");
        assert_eq!(page.page_number, 1);
        assert_eq!(page.text, "Name: ____");
        assert_eq!(page.image_count(), 0);
        assert!(!page.is_empty());
    }

    #[test]
    fn test_image_indices_are_contiguous() {
        let mut page = Page::new(2, "");
        page.add_image("first");
        page.add_image("");
        page.add_image("third");

        let indices: Vec<u32> = page.images.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(page.images[2].ocr_text, "third");
    }

    #[test]
    fn test_page_serialized_field_names() {
        let mut page = Page::new(1, "text");
        page.add_image("ocr");
        let value = serde_json::to_value(&page).unwrap();

        assert_eq!(value["page_number"], 1);
        assert_eq!(value["text"], "text");
        assert_eq!(value["images"][0]["index"], 1);
        assert_eq!(value["images"][0]["ocr_text"], "ocr");
    }
}
