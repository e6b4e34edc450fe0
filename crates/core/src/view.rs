//! Serializable snapshot of the board for the UI

use std::collections::BTreeMap;

use serde::Serialize;
use shakmaty::Color;

use crate::controller::{AnalysisState, SyncController};
use crate::engine::{AnalysisLine, EngineTransport, ReadyState};
use crate::rules::{MoveRecord, Position, Rules};

/// Everything the page needs to render the board and the analysis panel
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub fen: String,
    pub turn: &'static str,
    /// Ply being displayed
    pub ply: usize,
    pub history_len: usize,
    pub viewing_latest: bool,
    /// Legal destinations by origin square; empty while viewing history
    pub dests: BTreeMap<String, Vec<String>>,
    /// Squares of the move that led here, only at the latest ply
    pub last_move: Option<[String; 2]>,
    pub moves: Vec<MoveEntry>,
    pub lines: Vec<LineView>,
    pub engine: ReadyState,
    pub engine_launch_failed: bool,
    pub analysis: AnalysisState,
    pub analyzing: bool,
    pub check: bool,
    pub checkmate: bool,
    pub stalemate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveEntry {
    /// Ply reached after this move
    pub ply: usize,
    pub san: String,
    /// Long algebraic form, e.g. `g1f3`
    pub uci: String,
    /// `1. e4`, `e5`, or `7... Qd8` for a game that starts with Black
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineView {
    pub rank: u32,
    /// `+0.34`, `M-3`
    pub score: String,
    pub depth: u32,
    pub moves: String,
    pub score_cp: Option<i32>,
    pub mate_in: Option<i32>,
}

impl From<AnalysisLine> for LineView {
    fn from(line: AnalysisLine) -> Self {
        LineView {
            rank: line.rank,
            score: line.evaluation().to_string(),
            depth: line.depth,
            moves: line.moves,
            score_cp: line.score_cp,
            mate_in: line.mate_in,
        }
    }
}

impl<T: EngineTransport, R: Rules> SyncController<T, R> {
    pub fn snapshot(&self) -> BoardView {
        let position = self.position();
        let history = self.history();
        let status = history.rules().status(position).ok();

        let dests = self
            .dests()
            .iter()
            .map(|(from, tos)| (from.to_string(), tos.iter().map(|to| to.to_string()).collect()))
            .collect();

        let last_move = if self.is_viewing_latest() {
            history
                .moves()
                .last()
                .map(|m| [m.from.to_string(), m.to.to_string()])
        } else {
            None
        };

        BoardView {
            fen: position.fen().to_string(),
            turn: color_name(position.turn()),
            ply: self.cursor(),
            history_len: history.len(),
            viewing_latest: self.is_viewing_latest(),
            dests,
            last_move,
            moves: move_list(history.starting_position(), history.moves()),
            lines: self.lines().into_iter().map(LineView::from).collect(),
            engine: self.engine_state(),
            engine_launch_failed: self.engine_launch_failed(),
            analysis: self.analysis_state(),
            analyzing: self.is_analyzing(),
            check: status.map_or(false, |s| s.is_check),
            checkmate: status.map_or(false, |s| s.is_checkmate),
            stalemate: status.map_or(false, |s| s.is_stalemate),
        }
    }
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

/// Numbers the moves starting from the fullmove counter of `start`.
fn move_list(start: &Position, moves: &[MoveRecord]) -> Vec<MoveEntry> {
    let first_number: usize = start
        .fen()
        .split_whitespace()
        .nth(5)
        .and_then(|n| n.parse().ok())
        .unwrap_or(1);
    let offset = usize::from(start.turn() == Color::Black);

    moves
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let number = first_number + (i + offset) / 2;
            let label = match m.color {
                Color::White => format!("{}. {}", number, m.san),
                Color::Black if i == 0 => format!("{}... {}", number, m.san),
                Color::Black => m.san.clone(),
            };
            MoveEntry {
                ply: i + 1,
                san: m.san.clone(),
                uci: m.uci.clone(),
                label,
            }
        })
        .collect()
}
