//! JSON report rendering.

use crate::error::{Error, Result};
use crate::model::Document;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert a document to its JSON report.
///
/// Non-ASCII text is written as-is, not escaped.
pub fn to_json(doc: &Document, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(doc),
        JsonFormat::Compact => serde_json::to_string(doc),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Page;

    fn sample() -> Document {
        let mut doc = Document::new();
        let mut page = Page::new(1, "Nom: Müller ☐");
        page.add_image("scanned stamp");
        doc.push_page(page, 3);
        doc.push_page(Page::new(2, ""), 0);
        doc
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json(&sample(), JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"checkbox_count\": 3"));
        assert!(json.contains("Müller ☐"));
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_to_json_compact() {
        let json = to_json(&sample(), JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"ocr_text\":\"scanned stamp\""));
    }

    #[test]
    fn test_report_keys() {
        let value: serde_json::Value =
            serde_json::from_str(&to_json(&sample(), JsonFormat::Compact).unwrap()).unwrap();

        let mut top: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        top.sort_unstable();
        assert_eq!(top, vec!["checkbox_count", "pages"]);

        let mut page: Vec<&str> = value["pages"][0]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        page.sort_unstable();
        assert_eq!(page, vec!["images", "page_number", "text"]);

        let mut image: Vec<&str> = value["pages"][0]["images"][0]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        image.sort_unstable();
        assert_eq!(image, vec!["index", "ocr_text"]);
    }
}
