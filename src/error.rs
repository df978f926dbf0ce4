use thiserror::Error;

/// The embedded engine never became available. Permanent for the process.
#[derive(Debug, Clone, Error)]
#[error("EngineInitError: {reason}")]
pub struct EngineInitError {
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("LoadError: payload was read as text, expected a binary database image")]
    TextPayload,
    #[error("LoadError: file is empty")]
    Empty,
    #[error("LoadError: not a database image")]
    NotADatabase,
    #[error("LoadError: failed to stage database image: {0}")]
    Scratch(#[from] std::io::Error),
    #[error("LoadError: {0}")]
    Open(#[from] libsql::Error),
}

/// Every catalog query strategy failed. Carries the last failure.
#[derive(Debug, Error)]
pub enum CatalogExtractionError {
    #[error("CatalogExtractionError: {strategy} query failed")]
    Query {
        strategy: &'static str,
        #[source]
        source: libsql::Error,
    },
    #[error("CatalogExtractionError: no query strategies to run")]
    NoStrategies,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct HighlightExtractionError(#[from] pub libsql::Error);

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("ExportError: no book selected")]
    NothingSelected,
    #[error("ExportError: no exportable highlights for {0}")]
    NotExportable(String),
    #[error("ExportError: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("ExportError: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineInitError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Catalog(#[from] CatalogExtractionError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("SessionError: no database loaded")]
    NoDatabase,
    #[error("SessionError: unknown book {0}")]
    UnknownBook(String),
}

impl SessionError {
    /// Whether the failure was caused by what the user supplied rather than by the engine.
    pub fn is_user_error(&self) -> bool {
        use SessionError::*;
        match self {
            Load(LoadError::Scratch(_)) => false,
            Load(_) | NoDatabase | UnknownBook(_) => true,
            Export(ExportError::NothingSelected | ExportError::NotExportable(_)) => true,
            _ => false,
        }
    }
}
