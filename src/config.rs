use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_yaml;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineSettings;
use crate::export::ExportFormat;

#[derive(Parser, Debug)]
#[command(name = "koboexport")]
#[command(about = "Browse and export Kobo highlights", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config", global = true)]
    pub config_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the web interface
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the books of a KoboReader.sqlite file
    Books {
        file: PathBuf,
        #[arg(short, long)]
        search: Option<String>,
        /// Write the whole book list in this format instead of printing it
        #[arg(short, long, value_enum)]
        export: Option<ExportFormat>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show the highlights of one book
    Highlights {
        file: PathBuf,
        /// ContentID of the book, as listed by `books`
        #[arg(short, long)]
        book: String,
        #[arg(short, long)]
        search: Option<String>,
        /// Write the unfiltered highlights to a markdown file
        #[arg(short, long)]
        export: bool,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".koboexport")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_retry_delay_ms")]
    pub engine_retry_delay_ms: u64,
    #[serde(default = "default_true")]
    pub inline_highlight_errors: bool,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

fn default_port() -> u16 {
    8080
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_upload_mb() -> usize {
    512
}

impl Default for App {
    fn default() -> Self {
        App {
            port: default_port(),
            engine_retry_delay_ms: default_retry_delay_ms(),
            inline_highlight_errors: true,
            export_dir: default_export_dir(),
            max_upload_mb: default_max_upload_mb(),
            scratch_dir: None,
        }
    }
}

impl App {
    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            retry_delay: Duration::from_millis(self.engine_retry_delay_ms),
            scratch_dir: self.scratch_dir.clone(),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub app: App,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    /// Loads `path` when given. Without a path, the default location is used
    /// if it exists and built-in defaults otherwise.
    pub fn resolve(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Config::new(path).with_context(|| format!("failed to load config {}", path)),
            None => {
                let path = default_config_path();
                if path.exists() {
                    let path = path.to_string_lossy();
                    Config::new(&path).with_context(|| format!("failed to load config {}", path))
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::parse(&yaml_str)
    }

    fn parse(yaml_str: &str) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    /// Expands `${VAR}` and `${VAR:-default}`. An unset variable without a
    /// default expands to nothing; an unterminated `${` is left as written.
    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")?;

        let result = pattern.replace_all(yaml_str, |caps: &Captures| {
            let var_name = &caps[1];
            match (env::var(var_name), caps.get(2)) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.as_str().to_string(),
                (Err(_), None) => {
                    tracing::warn!(var = var_name, "environment variable not found");
                    String::new()
                }
            }
        });

        Ok(result.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_keys_missing() {
        let cfg = Config::parse("app: {}\n").unwrap();
        assert_eq!(cfg.app.get_port(), 8080);
        assert_eq!(cfg.app.engine_retry_delay_ms, 1000);
        assert!(cfg.app.inline_highlight_errors);
        assert_eq!(cfg.app.max_upload_bytes(), 512 * 1024 * 1024);

        let empty = Config::parse("{}").unwrap();
        assert_eq!(empty.app.get_port(), 8080);
    }

    #[test]
    fn test_env_substitution_with_default() {
        let yaml = "app:\n  port: ${KOBOEXPORT_TEST_UNSET_PORT:-9191}\n  inline_highlight_errors: false\n";
        let cfg = Config::parse(yaml).unwrap();
        assert_eq!(cfg.app.get_port(), 9191);
        assert!(!cfg.app.inline_highlight_errors);
        assert_eq!(cfg.app.engine_settings().retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_env_substitution_leaves_unterminated_placeholder() {
        let out = Config::substitute_env_vars("a: ${KOBOEXPORT_TEST_UNSET:-x}\nb: ${oops\nc: }\n").unwrap();
        assert_eq!(out, "a: x\nb: ${oops\nc: }\n");

        let out = Config::substitute_env_vars("d: ${KOBOEXPORT_TEST_UNSET}!\n").unwrap();
        assert_eq!(out, "d: !\n");
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["koboexport", "books", "KoboReader.sqlite", "--export", "md"]);
        match cli.command {
            Command::Books { file, export, .. } => {
                assert_eq!(file, PathBuf::from("KoboReader.sqlite"));
                assert_eq!(export, Some(ExportFormat::Markdown));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from(["koboexport", "-c", "cfg.yaml", "highlights", "db", "--book", "id", "-e"]);
        assert_eq!(cli.config_path.as_deref(), Some("cfg.yaml"));
        assert!(matches!(cli.command, Command::Highlights { export: true, .. }));
    }
}
