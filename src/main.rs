use std::io::IsTerminal;

use axum::http::Method;
use clap::Parser;
use koboexport::cli::{self, Output};
use koboexport::config::{Cli, Command, Config};
use koboexport::handler::AppState;
use koboexport::routes::routes;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut cfg = Config::resolve(args.config_path.as_deref()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to load config file");
        std::process::exit(1);
    });

    let result = match args.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                cfg.app.set_port(port);
            }
            serve(cfg).await;
            Ok(())
        }
        Command::Books {
            file,
            search,
            export,
            out,
        } => {
            let mut output = stdout();
            cli::books(&cfg, &file, search.as_deref(), export, out.as_deref(), &mut output).await
        }
        Command::Highlights {
            file,
            book,
            search,
            export,
            out,
        } => {
            let mut output = stdout();
            cli::highlights(&cfg, &file, &book, search.as_deref(), export, out.as_deref(), &mut output).await
        }
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn stdout() -> Output<std::io::StdoutLock<'static>> {
    let stdout = std::io::stdout();
    let color = stdout.is_terminal();
    Output {
        writer: stdout.lock(),
        color,
    }
}

async fn serve(cfg: Config) {
    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let state = AppState::new(cfg);

    // start the engine now so the first upload does not wait for it
    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.get().await {
            tracing::error!(error = %e, "engine initialization failed");
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    let app = routes(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("koboexport.svc running on {}", &address);
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
        }
        tracing::info!("ctrl+c signal received, preparing to shutdown");
    };

    if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }

    tracing::info!("koboexport.svc going off, graceful shutdown complete");
}
