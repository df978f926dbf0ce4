use std::borrow::Cow;
use std::fmt::Write;

use crate::engine::DatabaseHandle;
use crate::error::HighlightExtractionError;
use crate::model::HighlightRecord;

/// Shown in place of the highlight text when a book has none. Compared by
/// exact string equality downstream.
pub const NO_HIGHLIGHTS: &str = "no highlights found for this book";

/// Closes every highlight section of the formatted text.
pub const SECTION_SEPARATOR: &str = "---\n\n";

const HIGHLIGHTS_QUERY: &str = r#"
SELECT
    bookmark.Text AS HighlightText,
    bookmark.Annotation AS Note
FROM bookmark
WHERE bookmark.VolumeID = ?
ORDER BY bookmark.DateCreated
"#;

/// Highlights of one book, or why they could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Highlights {
    Found(String),
    NoneFound,
    Failed(String),
}

impl Highlights {
    /// Text for the content pane. Query failures are rendered inline.
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            Highlights::Found(text) => Cow::Borrowed(text.as_str()),
            Highlights::NoneFound => Cow::Borrowed(NO_HIGHLIGHTS),
            Highlights::Failed(msg) => Cow::Owned(format!("error loading highlights: {}", msg)),
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Highlights::Found(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Highlights::Failed(msg) => Some(msg.as_str()),
            _ => None,
        }
    }

    pub fn is_exportable(&self) -> bool {
        matches!(self, Highlights::Found(_))
    }
}

/// Reads the highlights of a book in creation order. Bookmarks without text
/// (plain page markers) are skipped but keep their position.
pub async fn fetch_highlights(
    handle: &DatabaseHandle,
    content_id: &str,
) -> Result<Vec<HighlightRecord>, HighlightExtractionError> {
    let mut rows = handle
        .connection()
        .query(HIGHLIGHTS_QUERY, libsql::params![content_id])
        .await?;

    let mut records = Vec::new();
    let mut position = 0;

    while let Some(row) = rows.next().await? {
        position += 1;
        let text: Option<String> = row.get(0)?;
        let note: Option<String> = row.get(1)?;

        let Some(text) = text.filter(|t| !t.is_empty()) else {
            continue;
        };

        records.push(HighlightRecord {
            position,
            text,
            note: note.filter(|n| !n.is_empty()),
        });
    }

    tracing::debug!(
        content_id,
        bookmarks = position,
        skipped = position - records.len(),
        "read highlights"
    );

    Ok(records)
}

pub fn format_highlights(records: &[HighlightRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let _ = write!(out, "Highlight {}:\n\n{}\n", record.position, record.text);
        if let Some(note) = &record.note {
            let _ = write!(out, "\nNote: {}\n", note);
        }
        out.push('\n');
        out.push_str(SECTION_SEPARATOR);
    }
    out
}

pub async fn extract_highlights(handle: &DatabaseHandle, content_id: &str) -> Highlights {
    match fetch_highlights(handle, content_id).await {
        Ok(records) if records.is_empty() => Highlights::NoneFound,
        Ok(records) => Highlights::Found(format_highlights(&records)),
        Err(e) => {
            tracing::error!(content_id, error = %e, "failed to load highlights");
            Highlights::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, KoboFixture};

    #[tokio::test]
    async fn test_dune_highlights_are_formatted_in_creation_order() {
        let handle = fixtures::open(fixtures::dune().await).await;

        let highlights = extract_highlights(&handle, "dune").await;
        assert_eq!(
            highlights,
            Highlights::Found(
                "Highlight 1:\n\nFear is the mind-killer\n\n---\n\n\
                 Highlight 2:\n\nI must not fear\n\nNote: mantra\n\n---\n\n"
                    .to_string()
            )
        );
        assert!(highlights.is_exportable());
    }

    #[tokio::test]
    async fn test_book_without_highlights_yields_sentinel() {
        let handle = fixtures::open(fixtures::dune().await).await;

        let highlights = extract_highlights(&handle, "emma").await;
        assert_eq!(highlights, Highlights::NoneFound);
        assert_eq!(highlights.display_text(), NO_HIGHLIGHTS);
        assert!(!highlights.is_exportable());
    }

    #[tokio::test]
    async fn test_textless_bookmarks_are_skipped_but_counted() {
        let bytes = KoboFixture::new()
            .book("b", "Book", None)
            .highlight("b", None, Some("dog-ear"), "1")
            .highlight("b", Some(""), None, "2")
            .highlight("b", Some("kept"), Some(""), "3")
            .build()
            .await;
        let handle = fixtures::open(bytes).await;

        let records = fetch_highlights(&handle, "b").await.unwrap();
        assert_eq!(
            records,
            vec![HighlightRecord {
                position: 3,
                text: "kept".into(),
                note: None,
            }]
        );
        assert_eq!(format_highlights(&records), "Highlight 3:\n\nkept\n\n---\n\n");
    }

    #[tokio::test]
    async fn test_query_failure_is_reported_inline() {
        let bytes = KoboFixture::new()
            .book("b", "Book", None)
            .without_bookmark_table()
            .build()
            .await;
        let handle = fixtures::open(bytes).await;

        let highlights = extract_highlights(&handle, "b").await;
        let msg = highlights.error().expect("query should fail").to_string();
        assert!(msg.contains("bookmark"));
        assert!(highlights.display_text().starts_with("error loading highlights: "));
        assert!(highlights.content().is_none());
        assert!(!highlights.is_exportable());
    }
}
