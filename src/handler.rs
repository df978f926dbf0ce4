use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::api::{ApiResponse, CatalogView, ErrorResponse, HighlightParams, HighlightsView, SearchParams, SelectRequest};
use crate::config::Config;
use crate::engine::{EngineCell, Payload};
use crate::error::SessionError;
use crate::export::{ExportArtifact, ExportFormat};
use crate::session::Session;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EngineCell>,
    pub session: Arc<Mutex<Session>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            engine: Arc::new(EngineCell::new(config.app.engine_settings())),
            session: Arc::new(Mutex::new(Session::new())),
            config: Arc::new(config),
        }
    }
}

fn success<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse { data })).into_response()
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(msg: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, msg)
}

fn session_error(err: &SessionError) -> Response {
    let status = if err.is_user_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_response(status, &crate::unpack_error(err))
}

impl IntoResponse for ExportArtifact {
    fn into_response(self) -> Response {
        let ascii_name: String = self
            .filename
            .chars()
            .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
            .collect();
        let disposition = format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii_name,
            urlencoding::encode(&self.filename)
        );
        let disposition =
            HeaderValue::from_str(&disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment"));

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(self.mime)),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.content,
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    engine: &'static str,
    loaded: bool,
}

pub async fn healthcheck(State(state): State<AppState>) -> impl IntoResponse {
    let engine = match state.engine.status() {
        None => "pending",
        Some(Ok(_)) => "ready",
        Some(Err(_)) => "unavailable",
    };
    let loaded = state.session.lock().await.is_loaded();
    tracing::debug!(engine, loaded, "got healthcheck request");
    Json(Health {
        status: "ok",
        engine,
        loaded,
    })
}

pub async fn import(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("failed to read upload: {}", e);
                return bad_request("failed to read upload");
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or("upload.sqlite").to_string();
        let is_text = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("text/"));

        let payload = if is_text {
            field.text().await.map(Payload::Text)
        } else {
            field.bytes().await.map(|b| Payload::Binary(b.to_vec()))
        };

        match payload {
            Ok(payload) => upload = Some((name, payload)),
            Err(e) => {
                tracing::error!("failed to read file field: {}", e);
                return bad_request("failed to read file field");
            }
        }
        break;
    }

    let Some((name, payload)) = upload else {
        return bad_request("multipart field 'file' is required");
    };

    tracing::info!(file = %name, "processing upload");

    let mut session = state.session.lock().await;
    if let Err(e) = session.import(&state.engine, &name, payload).await {
        return session_error(&e);
    }
    success(CatalogView::new(&session))
}

pub async fn get_books(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let mut session = state.session.lock().await;
    if !session.is_loaded() {
        return session_error(&SessionError::NoDatabase);
    }
    if let Some(q) = params.q {
        session.set_catalog_filter(&q);
    }
    success(CatalogView::new(&session))
}

pub async fn select_book(State(state): State<AppState>, Json(payload): Json<SelectRequest>) -> Response {
    let mut session = state.session.lock().await;
    if let Err(e) = session.select(&payload.content_id).await {
        return session_error(&e);
    }
    // a new book starts unfiltered
    session.set_highlight_filter("");

    match HighlightsView::new(&session, state.config.app.inline_highlight_errors, false) {
        Some(view) => success(view),
        None => session_error(&SessionError::UnknownBook(payload.content_id)),
    }
}

pub async fn get_highlights(State(state): State<AppState>, Query(params): Query<HighlightParams>) -> Response {
    let mut session = state.session.lock().await;
    if let Some(q) = params.q {
        session.set_highlight_filter(&q);
    }

    match HighlightsView::new(&session, state.config.app.inline_highlight_errors, params.emphasis) {
        Some(view) => success(view),
        None => bad_request("no book selected"),
    }
}

pub async fn export_books(State(state): State<AppState>, Path(format): Path<String>) -> Response {
    let Some(format) = ExportFormat::from_extension(&format) else {
        return bad_request("format must be one of json, csv, md");
    };

    let session = state.session.lock().await;
    match session.export_catalog(format) {
        Ok(artifact) => artifact.into_response(),
        Err(e) => session_error(&e),
    }
}

pub async fn export_highlights(State(state): State<AppState>) -> Response {
    let session = state.session.lock().await;
    match session.export_highlights() {
        Ok(artifact) => artifact.into_response(),
        Err(e) => session_error(&e),
    }
}

pub async fn serve_index() -> Html<&'static str> {
    Html(
        r#"
        <!doctype html>
        <html>
            <head><title>koboexport</title></head>
            <body>
                <h1>Kobo highlights</h1>
                <p>
                    Connect your Kobo to a computer and look for the hidden <code>.kobo</code>
                    directory. It contains a file named <code>KoboReader.sqlite</code>.
                </p>
                <form action="/import" method="post" enctype="multipart/form-data">
                    <label>
                        Database file:
                        <input type="file" name="file" accept=".sqlite">
                    </label>

                    <input type="submit" value="Import">
                </form>
                <p>
                    Import answers with the book list as JSON. Pick a book with
                    <code>PUT /selection</code> and a <code>{"content_id": "..."}</code> body, then read
                    or search its highlights with <code>GET /highlights?q=</code>.
                </p>
                <ul>
                    <li><a href="/books">Books</a></li>
                    <li><a href="/export/books/json">Export JSON</a></li>
                    <li><a href="/export/books/csv">Export CSV</a></li>
                    <li><a href="/export/books/md">Export Markdown</a></li>
                </ul>
            </body>
        </html>
        "#,
    )
}
