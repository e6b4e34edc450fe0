//! Error types for analysis-board-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Engine unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("Engine is not ready")]
    EngineNotReady,

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Cannot play a move while viewing ply {ply} of {len}")]
    ViewingHistory { ply: usize, len: usize },

    #[error("Cannot append at ply {at}, history ends at ply {len}")]
    HistoricalPly { at: usize, len: usize },

    #[error("Ply {ply} is outside 0..={len}")]
    PlyOutOfRange { ply: usize, len: usize },

    #[error("History replay failed at ply {ply} ({san})")]
    Replay { ply: usize, san: String },

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid FEN/PGN")]
    ImportInvalid {
        /// FEN the input field should be reverted to.
        last_valid: String,
    },

    #[error("Analysis unavailable: {0}")]
    AnalysisUnavailable(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
