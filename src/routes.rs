use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::handler::{self, AppState};

pub fn routes(state: AppState) -> Router {
    let upload_limit = state.config.app.max_upload_bytes();

    Router::new()
        .route("/", get(handler::healthcheck))
        .route("/index.html", get(handler::serve_index))
        .route("/import", post(handler::import))
        .route("/books", get(handler::get_books))
        .route("/selection", put(handler::select_book))
        .route("/highlights", get(handler::get_highlights))
        .route("/export/books/:format", get(handler::export_books))
        .route("/export/highlights", get(handler::export_highlights))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
