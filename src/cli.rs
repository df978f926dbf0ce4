//! One-shot commands: load a database file, print or export, exit.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::Config;
use crate::engine::{EngineCell, Payload};
use crate::export::{self, ExportFormat};
use crate::filter::Line;
use crate::session::Session;

const EMPHASIS_START: &str = "\x1b[1;33m";
const EMPHASIS_END: &str = "\x1b[0m";

pub struct Output<W: Write> {
    pub writer: W,
    /// Emphasize search matches with ANSI escapes.
    pub color: bool,
}

async fn load(cfg: &Config, file: &Path) -> Result<Session> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let engine = EngineCell::new(cfg.app.engine_settings());
    let mut session = Session::new();
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    session
        .import(&engine, &name, Payload::Binary(bytes))
        .await
        .map_err(|e| anyhow::anyhow!(crate::unpack_error(&e)))?;

    Ok(session)
}

fn out_dir(cfg: &Config, out: Option<&Path>) -> PathBuf {
    out.map(Path::to_path_buf)
        .unwrap_or_else(|| cfg.app.export_dir.clone())
}

pub async fn books<W: Write>(
    cfg: &Config,
    file: &Path,
    search: Option<&str>,
    format: Option<ExportFormat>,
    out: Option<&Path>,
    output: &mut Output<W>,
) -> Result<()> {
    let mut session = load(cfg, file).await?;

    if let Some(format) = format {
        let artifact = session.export_catalog(format)?;
        let path = export::write_artifact(&out_dir(cfg, out), &artifact).await?;
        writeln!(output.writer, "{}", path.display())?;
        return Ok(());
    }

    session.set_catalog_filter(search.unwrap_or(""));
    let books = session.visible_books();
    if books.is_empty() {
        tracing::info!("no books found");
    }

    for book in books {
        match &book.author {
            Some(author) => writeln!(output.writer, "{}\t{}\t{}", book.content_id, book.title, author)?,
            None => writeln!(output.writer, "{}\t{}", book.content_id, book.title)?,
        }
    }
    Ok(())
}

pub async fn highlights<W: Write>(
    cfg: &Config,
    file: &Path,
    book: &str,
    search: Option<&str>,
    export: bool,
    out: Option<&Path>,
    output: &mut Output<W>,
) -> Result<()> {
    let mut session = load(cfg, file).await?;
    let highlights = session.select(book).await?;

    if let Some(msg) = highlights.error() {
        if !cfg.app.inline_highlight_errors {
            bail!("failed to load highlights: {}", msg);
        }
    }

    if export {
        let artifact = session.export_highlights()?;
        let path = export::write_artifact(&out_dir(cfg, out), &artifact).await?;
        writeln!(output.writer, "{}", path.display())?;
        return Ok(());
    }

    session.set_highlight_filter(search.unwrap_or(""));
    if let Some(lines) = session.emphasized_highlights() {
        write_lines(output, &lines)?;
    }
    Ok(())
}

fn write_lines<W: Write>(output: &mut Output<W>, lines: &[Line]) -> Result<()> {
    for line in lines {
        for segment in line {
            if segment.emphasized && output.color {
                write!(output.writer, "{}{}{}", EMPHASIS_START, segment.text, EMPHASIS_END)?;
            } else {
                write!(output.writer, "{}", segment.text)?;
            }
        }
        writeln!(output.writer)?;
    }
    Ok(())
}
