//! Document-level types.

use super::Page;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The structured result of extracting one PDF.
///
/// Serializes to the report shape `{"pages": [...], "checkbox_count": N}`.
/// Per-page checkbox counts and metadata travel with the value for the
/// chart sink and the CLI but are not part of the JSON report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pages: Vec<Page>,

    checkbox_count: u32,

    #[serde(skip)]
    page_checkbox_counts: Vec<u32>,

    #[serde(skip)]
    metadata: Metadata,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document carrying source metadata.
    pub fn with_metadata(metadata: Metadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    /// Append a page together with the number of checkboxes found on it.
    pub fn push_page(&mut self, page: Page, checkbox_count: u32) {
        self.pages.push(page);
        self.page_checkbox_counts.push(checkbox_count);
        self.checkbox_count += checkbox_count;
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_number: u32) -> Option<&Page> {
        if page_number == 0 {
            return None;
        }
        self.pages.get((page_number - 1) as usize)
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Checkboxes detected across all pages.
    pub fn checkbox_count(&self) -> u32 {
        self.checkbox_count
    }

    /// Checkboxes detected on each page, in page order.
    ///
    /// Empty for documents deserialized from a report, which does not carry
    /// the breakdown.
    pub fn page_checkbox_counts(&self) -> &[u32] {
        &self.page_checkbox_counts
    }

    /// Source document metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Total number of embedded images across all pages.
    pub fn image_count(&self) -> usize {
        self.pages.iter().map(Page::image_count).sum()
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,

    /// Document author
    pub author: Option<String>,

    /// Creator application
    pub creator: Option<String>,

    /// PDF producer
    pub producer: Option<String>,

    /// Creation date
    pub created: Option<DateTime<Utc>>,

    /// Last modification date
    pub modified: Option<DateTime<Utc>>,

    /// PDF version (e.g., "1.7")
    pub pdf_version: String,

    /// Total number of pages
    pub page_count: u32,
}

impl Metadata {
    /// Create new metadata with PDF version.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            pdf_version: version.into(),
            ..Default::default()
        }
    }
}
