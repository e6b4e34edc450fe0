//! Analysis Board Core Library

pub mod controller;
pub mod engine;
pub mod error;
pub mod history;
pub mod parser;
pub mod rules;
pub mod view;

pub use controller::{AnalysisState, ImportOutcome, Navigation, SyncController};
pub use engine::{EngineSession, ProcessTransport, SessionConfig};
pub use error::{Error, Result};
pub use history::PositionHistory;
pub use rules::{MoveSpec, Position, Rules, StandardRules, START_FEN};
pub use view::BoardView;
