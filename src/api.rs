use serde::{Deserialize, Serialize};

use crate::filter::{self, Line};
use crate::model::BookEntry;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HighlightParams {
    pub q: Option<String>,
    #[serde(default)]
    pub emphasis: bool,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub content_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct CatalogView<'a> {
    pub source: Option<&'a str>,
    pub strategy: Option<&'static str>,
    pub query: &'a str,
    /// Size of the whole catalog, before filtering.
    pub total: usize,
    pub books: Vec<&'a BookEntry>,
}

impl<'a> CatalogView<'a> {
    pub fn new(session: &'a Session) -> Self {
        CatalogView {
            source: session.source(),
            strategy: session.strategy(),
            query: session.catalog_filter(),
            total: session.books().len(),
            books: session.visible_books(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HighlightsView {
    pub content_id: String,
    pub title: String,
    pub query: String,
    pub content: Option<String>,
    pub error: Option<String>,
    pub exportable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<Line>>,
}

impl HighlightsView {
    /// `None` when nothing is selected. With `inline_errors`, query failures
    /// are part of `content`; otherwise they are reported in `error` only.
    pub fn new(session: &Session, inline_errors: bool, emphasis: bool) -> Option<Self> {
        let selection = session.selection()?;
        let highlights = session.highlights()?;

        let (content, error) = match highlights.error() {
            Some(msg) if !inline_errors => (None, Some(msg.to_string())),
            _ => (session.visible_highlights(), None),
        };

        let lines = if emphasis {
            content
                .as_deref()
                .map(|text| filter::emphasize(text, session.highlight_filter()))
        } else {
            None
        };

        Some(HighlightsView {
            content_id: selection.content_id.clone(),
            title: selection.title.clone(),
            query: session.highlight_filter().to_string(),
            content,
            error,
            exportable: highlights.is_exportable(),
            lines,
        })
    }
}
