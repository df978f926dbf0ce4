//! Embedded SQL engine lifecycle.
//!
//! The engine is initialized once per process and memoized: every loader call
//! awaits the same cell, so a slow or failed start is observed consistently.
//! Initialization gets exactly one retry after a fixed delay, after which the
//! failure is permanent.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use libsql::{Builder, Connection, Database as LibsqlDatabase};
use tempfile::TempDir;
use tokio::sync::OnceCell;

use crate::error::{EngineInitError, LoadError};

/// Every SQLite database image starts with this header string.
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Raw file content as handed over by whatever read the user's file.
#[derive(Debug, Clone)]
pub enum Payload {
    Binary(Vec<u8>),
    Text(String),
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub retry_delay: Duration,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            retry_delay: DEFAULT_RETRY_DELAY,
            scratch_dir: None,
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    version: String,
    scratch_root: PathBuf,
}

impl Engine {
    async fn init(settings: &EngineSettings) -> Result<Self, EngineInitError> {
        let scratch_root = settings.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        tokio::fs::create_dir_all(&scratch_root)
            .await
            .map_err(|e| EngineInitError {
                reason: format!("scratch directory {:?} unavailable: {}", scratch_root, e),
            })?;

        let version = Self::probe().await.map_err(|e| EngineInitError {
            reason: format!("engine probe failed: {}", e),
        })?;

        Ok(Engine {
            version,
            scratch_root,
        })
    }

    async fn probe() -> Result<String, libsql::Error> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;
        let mut rows = conn.query("SELECT sqlite_version()", ()).await?;
        match rows.next().await? {
            Some(row) => row.get::<String>(0),
            None => Ok(String::from("unknown")),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Opens a database image.
    ///
    /// The image is staged into a private scratch directory owned by the
    /// returned handle, so the user's file is never touched by the engine.
    pub async fn open(&self, payload: Payload) -> Result<DatabaseHandle, LoadError> {
        let bytes = match payload {
            Payload::Binary(bytes) => bytes,
            Payload::Text(_) => return Err(LoadError::TextPayload),
        };

        if bytes.is_empty() {
            return Err(LoadError::Empty);
        }
        if !bytes.starts_with(SQLITE_MAGIC) {
            return Err(LoadError::NotADatabase);
        }

        let scratch = tempfile::Builder::new()
            .prefix("koboexport-")
            .tempdir_in(&self.scratch_root)?;
        let path = scratch.path().join("KoboReader.sqlite");
        tokio::fs::write(&path, &bytes).await?;

        let db = Builder::new_local(&path).build().await?;
        let conn = db.connect()?;

        // sqlite parses the image lazily, force it now
        let mut rows = conn.query("SELECT COUNT(*) FROM sqlite_master", ()).await?;
        rows.next().await?;

        tracing::debug!(bytes = bytes.len(), path = ?path, "database image opened");

        Ok(DatabaseHandle {
            conn,
            _db: db,
            _scratch: scratch,
            size: bytes.len(),
        })
    }
}

/// An opened database image. Dropping it closes the connection and removes the
/// staged copy.
pub struct DatabaseHandle {
    conn: Connection,
    _db: LibsqlDatabase,
    _scratch: TempDir,
    size: usize,
}

impl DatabaseHandle {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl std::fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle").field("size", &self.size).finish()
    }
}

/// Runs `attempt`, and if it fails, once more after `retry_delay`.
pub(crate) async fn init_with_retry<T, F, Fut>(mut attempt: F, retry_delay: Duration) -> Result<T, EngineInitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineInitError>>,
{
    match attempt().await {
        Ok(value) => return Ok(value),
        Err(e) => {
            tracing::warn!(error = %e, delay_ms = retry_delay.as_millis() as u64, "engine not available, retrying once");
        }
    }

    tokio::time::sleep(retry_delay).await;

    attempt().await.inspect_err(|e| {
        tracing::error!(error = %e, "engine unavailable, giving up for this session");
    })
}

/// Process-wide, lazily initialized engine.
pub struct EngineCell {
    cell: OnceCell<Result<Engine, EngineInitError>>,
    settings: EngineSettings,
}

impl EngineCell {
    pub fn new(settings: EngineSettings) -> Self {
        EngineCell {
            cell: OnceCell::new(),
            settings,
        }
    }

    /// Resolves the engine, initializing it on first use.
    pub async fn get(&self) -> Result<&Engine, EngineInitError> {
        let result = self
            .cell
            .get_or_init(|| async {
                let engine = init_with_retry(|| Engine::init(&self.settings), self.settings.retry_delay).await;
                if let Ok(engine) = &engine {
                    tracing::info!(
                        version = engine.version(),
                        scratch = ?engine.scratch_root(),
                        "sqlite engine ready"
                    );
                }
                engine
            })
            .await;

        result.as_ref().map_err(Clone::clone)
    }

    /// `None` while initialization has not finished.
    pub fn status(&self) -> Option<Result<&str, &EngineInitError>> {
        self.cell
            .get()
            .map(|r| r.as_ref().map(|engine| engine.version()))
    }
}

impl Default for EngineCell {
    fn default() -> Self {
        EngineCell::new(EngineSettings::default())
    }
}
