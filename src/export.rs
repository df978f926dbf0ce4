//! Catalog and highlight exports.
//!
//! Serializers return an [`ExportArtifact`]; delivering it (HTTP attachment or
//! a file on disk) is up to the caller.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::error::ExportError;
use crate::model::BookEntry;

const CATALOG_BASENAME: &str = "kobo-booklist";
const CATALOG_HEADING: &str = "# Kobo Book List";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
    #[value(name = "md")]
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "md",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            "md" | "markdown" => Some(ExportFormat::Markdown),
            _ => None,
        }
    }
}

/// A finished export, ready to be saved under `filename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub content: Vec<u8>,
    pub mime: &'static str,
}

pub fn serialize_catalog(books: &[BookEntry], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    let content = match format {
        ExportFormat::Json => serde_json::to_string_pretty(books)?,
        ExportFormat::Csv => catalog_csv(books),
        ExportFormat::Markdown => catalog_markdown(books),
    };
    Ok(content.into_bytes())
}

pub fn export_catalog(books: &[BookEntry], format: ExportFormat) -> Result<ExportArtifact, ExportError> {
    Ok(ExportArtifact {
        filename: format!("{}.{}", CATALOG_BASENAME, format.extension()),
        content: serialize_catalog(books, format)?,
        mime: format.mime(),
    })
}

/// Wraps a formatted highlight block under a heading with the book title.
pub fn export_highlights(title: &str, highlights: &str) -> ExportArtifact {
    ExportArtifact {
        filename: format!("{}-highlights.md", sanitize_filename(title)),
        content: format!("# {}\n\n{}", title, highlights).into_bytes(),
        mime: ExportFormat::Markdown.mime(),
    }
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn catalog_csv(books: &[BookEntry]) -> String {
    let mut out = String::from("Title,Author\n");
    for book in books {
        let author = book.author.as_deref().unwrap_or("");
        let _ = writeln!(out, "{},{}", csv_field(&book.title), csv_field(author));
    }
    out
}

// markdown specials in titles are written as-is
fn catalog_markdown(books: &[BookEntry]) -> String {
    let mut out = format!("{}\n\n", CATALOG_HEADING);
    for book in books {
        match &book.author {
            Some(author) => {
                let _ = writeln!(out, "- {} by {}", book.title, author);
            }
            None => {
                let _ = writeln!(out, "- {}", book.title);
            }
        }
    }
    out
}

/// Replaces characters that common filesystems reject with `-`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '-',
            c => c,
        })
        .collect()
}

/// Saves an artifact into `dir`, returning the written path.
pub async fn write_artifact(dir: &Path, artifact: &ExportArtifact) -> Result<PathBuf, ExportError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&artifact.filename);
    tokio::fs::write(&path, &artifact.content).await?;
    tracing::info!(path = ?path, bytes = artifact.content.len(), "export written");
    Ok(path)
}
