//! In-memory state of one browsing session.
//!
//! A session owns at most one open database. Importing a new file replaces
//! the handle and the catalog wholesale and clears the selection. Failures of
//! import-level actions land in a dedicated error region; highlight query
//! failures travel inside [`Highlights`] instead.

use crate::engine::{DatabaseHandle, EngineCell, Payload};
use crate::error::{ExportError, SessionError};
use crate::export::{self, ExportArtifact, ExportFormat};
use crate::filter::{self, Line};
use crate::kobo::{self, Highlights};
use crate::model::{BookEntry, Selection};

#[derive(Debug, Default)]
pub struct Session {
    source: Option<String>,
    handle: Option<DatabaseHandle>,
    books: Vec<BookEntry>,
    strategy: Option<&'static str>,
    selection: Option<Selection>,
    highlights: Option<Highlights>,
    catalog_term: String,
    highlight_term: String,
    error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `payload` and loads its catalog.
    ///
    /// When the engine is unavailable or the file cannot be opened, the
    /// previous database stays loaded. Once the new file is open, the previous
    /// catalog and selection are gone even if the catalog queries fail.
    pub async fn import(
        &mut self,
        engine: &EngineCell,
        source: &str,
        payload: Payload,
    ) -> Result<&[BookEntry], SessionError> {
        self.error = None;

        let handle = match self.open(engine, payload).await {
            Ok(handle) => handle,
            Err(e) => return Err(self.record(e)),
        };

        tracing::info!(source, bytes = handle.size(), "database imported");

        self.source = Some(source.to_string());
        self.books.clear();
        self.strategy = None;
        self.selection = None;
        self.highlights = None;

        let handle = self.handle.insert(handle);
        match kobo::extract_catalog(handle).await {
            Ok(outcome) => {
                self.books = outcome.books;
                self.strategy = Some(outcome.strategy);
                Ok(&self.books)
            }
            Err(e) => Err(self.record(e.into())),
        }
    }

    async fn open(&self, engine: &EngineCell, payload: Payload) -> Result<DatabaseHandle, SessionError> {
        let engine = engine.get().await?;
        Ok(engine.open(payload).await?)
    }

    fn record(&mut self, err: SessionError) -> SessionError {
        let msg = crate::unpack_error(&err);
        tracing::error!(error = %msg, "session action failed");
        self.error = Some(msg);
        err
    }

    /// Selects a book of the current catalog and loads its highlights.
    pub async fn select(&mut self, content_id: &str) -> Result<&Highlights, SessionError> {
        let Some(handle) = self.handle.as_ref() else {
            return Err(SessionError::NoDatabase);
        };

        let Some(book) = self.books.iter().find(|b| b.content_id == content_id) else {
            return Err(SessionError::UnknownBook(content_id.to_string()));
        };

        tracing::info!(content_id, title = %book.title, "book selected");

        let selection = Selection {
            content_id: book.content_id.clone(),
            title: book.title.clone(),
        };
        let highlights = kobo::extract_highlights(handle, content_id).await;

        self.selection = Some(selection);
        Ok(&*self.highlights.insert(highlights))
    }

    pub fn set_catalog_filter(&mut self, term: &str) {
        self.catalog_term = term.to_string();
    }

    pub fn set_highlight_filter(&mut self, term: &str) {
        self.highlight_term = term.to_string();
    }

    pub fn catalog_filter(&self) -> &str {
        &self.catalog_term
    }

    pub fn highlight_filter(&self) -> &str {
        &self.highlight_term
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn books(&self) -> &[BookEntry] {
        &self.books
    }

    /// Name of the catalog strategy that produced the current books.
    pub fn strategy(&self) -> Option<&'static str> {
        self.strategy
    }

    pub fn visible_books(&self) -> Vec<&BookEntry> {
        filter::filter_catalog(&self.books, &self.catalog_term)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn highlights(&self) -> Option<&Highlights> {
        self.highlights.as_ref()
    }

    /// Highlight text as displayed: inline rendering, narrowed by the
    /// highlight filter.
    pub fn visible_highlights(&self) -> Option<String> {
        let highlights = self.highlights.as_ref()?;
        let text = highlights.display_text();
        Some(filter::filter_highlights(&text, &self.highlight_term).into_owned())
    }

    pub fn emphasized_highlights(&self) -> Option<Vec<Line>> {
        let text = self.visible_highlights()?;
        Some(filter::emphasize(&text, &self.highlight_term))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Exports the whole catalog, regardless of the catalog filter.
    pub fn export_catalog(&self, format: ExportFormat) -> Result<ExportArtifact, SessionError> {
        if self.handle.is_none() {
            return Err(SessionError::NoDatabase);
        }
        Ok(export::export_catalog(&self.books, format)?)
    }

    /// Exports the unfiltered highlights of the selected book.
    pub fn export_highlights(&self) -> Result<ExportArtifact, SessionError> {
        let selection = self.selection.as_ref().ok_or(ExportError::NothingSelected)?;
        let text = self
            .highlights
            .as_ref()
            .and_then(Highlights::content)
            .ok_or_else(|| ExportError::NotExportable(selection.title.clone()))?;

        Ok(export::export_highlights(&selection.title, text))
    }
}
