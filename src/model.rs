use serde::{Deserialize, Serialize};

/// A book-type row of the Kobo `content` table.
///
/// Serialized with the Kobo column names so a JSON export can be read back
/// next to the device database without a mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEntry {
    #[serde(rename = "ContentID")]
    pub content_id: String,
    #[serde(rename = "BookTitle")]
    pub title: String,
    #[serde(rename = "Author")]
    pub author: Option<String>,
}

impl BookEntry {
    /// Normalizes a raw catalog row. Returns `None` when the title is blank.
    pub fn from_row(content_id: String, title: Option<String>, author: Option<String>) -> Option<Self> {
        let title = title?.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let author = author
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        Some(BookEntry {
            content_id,
            title,
            author,
        })
    }
}

/// One highlight of a book, in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRecord {
    /// 1-based position of the bookmark row among all rows of the book.
    pub position: usize,
    pub text: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub content_id: String,
    pub title: String,
}
