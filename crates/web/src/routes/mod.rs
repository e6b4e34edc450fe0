use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use analysis_board_core::{BoardView, MoveSpec, Navigation};

use crate::error::ApiError;
use crate::AppState;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
    pub fen: String,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    pub from: String,
    pub to: String,
    /// `q`, `r`, `b` or `n`; queen when omitted
    pub promotion: Option<String>,
}

#[derive(Deserialize)]
pub struct PlyRequest {
    pub ply: usize,
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub text: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/board", get(board))
        .route("/api/move", post(play_move))
        .route("/api/back", post(back))
        .route("/api/forward", post(forward))
        .route("/api/ply", post(go_to_ply))
        .route("/api/import", post(import))
        .route("/api/analysis/start", post(start_analysis))
        .route("/api/analysis/stop", post(stop_analysis))
        .with_state(state)
}

pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    let fen = match state.board.snapshot().await {
        Ok(view) => view.fen,
        Err(e) => return e.into_response(),
    };

    let template = IndexTemplate {
        title: "Analysis Board".to_string(),
        fen,
    };
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Template error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn board(State(state): State<Arc<AppState>>) -> Result<Json<BoardView>, ApiError> {
    Ok(Json(state.board.snapshot().await?))
}

pub async fn play_move(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<BoardView>, ApiError> {
    let uci = format!(
        "{}{}{}",
        req.from.trim(),
        req.to.trim(),
        req.promotion.as_deref().unwrap_or("").trim()
    );
    let spec: MoveSpec = uci.parse()?;
    Ok(Json(state.board.play_move(spec).await?))
}

pub async fn back(State(state): State<Arc<AppState>>) -> Result<Json<BoardView>, ApiError> {
    Ok(Json(state.board.navigate(Navigation::Back).await?))
}

pub async fn forward(State(state): State<Arc<AppState>>) -> Result<Json<BoardView>, ApiError> {
    Ok(Json(state.board.navigate(Navigation::Forward).await?))
}

pub async fn go_to_ply(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlyRequest>,
) -> Result<Json<BoardView>, ApiError> {
    Ok(Json(state.board.navigate(Navigation::ToPly(req.ply)).await?))
}

pub async fn import(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<BoardView>, ApiError> {
    Ok(Json(state.board.import(req.text).await?))
}

pub async fn start_analysis(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BoardView>, ApiError> {
    Ok(Json(state.board.start_analysis().await?))
}

pub async fn stop_analysis(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BoardView>, ApiError> {
    Ok(Json(state.board.stop_analysis().await?))
}

pub async fn health() -> &'static str {
    "OK"
}
