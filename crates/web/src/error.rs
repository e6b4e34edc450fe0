use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use analysis_board_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Board(#[from] Error),

    #[error("Board is shutting down")]
    Unavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Board(e) => match e {
                Error::IllegalMove(_) | Error::InvalidPosition(_) | Error::ImportInvalid { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                Error::ViewingHistory { .. }
                | Error::HistoricalPly { .. }
                | Error::AnalysisUnavailable(_) => StatusCode::CONFLICT,
                Error::PlyOutOfRange { .. } => StatusCode::BAD_REQUEST,
                Error::EngineNotReady | Error::WorkerUnavailable(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                Error::Io(_) | Error::Replay { .. } => {
                    tracing::error!("Board error: {e}");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = match &self {
            // the client reverts its input box to this
            ApiError::Board(Error::ImportInvalid { last_valid }) => {
                json!({ "detail": self.to_string(), "fen": last_valid })
            }
            _ => json!({ "detail": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
