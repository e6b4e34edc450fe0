//! Ranked analysis lines for the current position

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use shakmaty::Color;

use super::protocol::{InfoLine, Score};

/// Represents a position evaluation from White's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Centipawn score (positive = white advantage)
    Centipawns(i32),
    /// Forced mate (positive = white mates, negative = black mates)
    Mate(i32),
}

impl Evaluation {
    /// Converts an engine score, which is relative to the side to move.
    pub fn from_engine(score: Score, side_to_move: Color) -> Self {
        let flip = |v: i32| match side_to_move {
            Color::White => v,
            Color::Black => v.saturating_neg(),
        };
        match score {
            Score::Cp(cp) => Evaluation::Centipawns(flip(cp)),
            Score::Mate(m) => Evaluation::Mate(flip(m)),
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Centipawns(cp) => {
                let score = *cp as f32 / 100.0;
                if score >= 0.0 {
                    write!(f, "+{:.2}", score)
                } else {
                    write!(f, "{:.2}", score)
                }
            }
            Evaluation::Mate(moves) => write!(f, "M{}", moves),
        }
    }
}

/// One ranked principal variation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisLine {
    /// 1-based `multipv` rank
    pub rank: u32,
    /// Moves in UCI notation, space separated
    pub moves: String,
    pub score_cp: Option<i32>,
    pub mate_in: Option<i32>,
    pub depth: u32,
}

impl AnalysisLine {
    pub fn evaluation(&self) -> Evaluation {
        match (self.mate_in, self.score_cp) {
            (Some(m), _) => Evaluation::Mate(m),
            (None, Some(cp)) => Evaluation::Centipawns(cp),
            (None, None) => Evaluation::Centipawns(0),
        }
    }
}

/// Keeps the best `capacity` lines for the position being analyzed.
#[derive(Debug, Clone)]
pub struct AnalysisAggregator {
    capacity: usize,
    side_to_move: Color,
    lines: BTreeMap<u32, AnalysisLine>,
}

impl AnalysisAggregator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            side_to_move: Color::White,
            lines: BTreeMap::new(),
        }
    }

    /// Drops every line; called whenever the analyzed position changes.
    pub fn reset(&mut self, side_to_move: Color) {
        self.lines.clear();
        self.side_to_move = side_to_move;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Records an info line. Returns false when the line was rejected.
    ///
    /// Without a rank the line counts as rank 1; the protocol layer already
    /// refuses rankless lines in multi-variation mode.
    pub fn update(&mut self, info: &InfoLine) -> bool {
        let rank = info.rank.unwrap_or(1);
        if rank == 0 || info.depth == 0 || info.pv.is_empty() {
            return false;
        }

        let (score_cp, mate_in) = match Evaluation::from_engine(info.score, self.side_to_move) {
            Evaluation::Centipawns(cp) => (Some(cp), None),
            Evaluation::Mate(m) => (None, Some(m)),
        };

        self.lines.insert(
            rank,
            AnalysisLine {
                rank,
                moves: info.pv.join(" "),
                score_cp,
                mate_in,
                depth: info.depth,
            },
        );
        true
    }

    /// Lines ordered by rank, at most `capacity` of them
    pub fn lines(&self) -> Vec<AnalysisLine> {
        self.lines
            .values()
            .take(self.capacity)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
