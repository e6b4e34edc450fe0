//! The game record
//!
//! A starting position plus the moves played from it. Every other position
//! the board shows is derived from this record by replaying a prefix of it.

use tracing::warn;

use crate::error::{Error, Result};
use crate::rules::{MoveRecord, MoveSpec, Position, Rules, StandardRules};

/// Linear move history. There are no variations.
#[derive(Debug, Clone)]
pub struct PositionHistory<R: Rules = StandardRules> {
    rules: R,
    starting_position: Position,
    moves: Vec<MoveRecord>,
    /// Replay result at full length
    latest: Position,
}

impl Default for PositionHistory<StandardRules> {
    fn default() -> Self {
        Self::new(StandardRules)
    }
}

impl<R: Rules> PositionHistory<R> {
    /// Empty history from the rules' default position
    pub fn new(rules: R) -> Self {
        let start = rules.default_position();
        Self {
            rules,
            starting_position: start.clone(),
            moves: Vec::new(),
            latest: start,
        }
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn starting_position(&self) -> &Position {
        &self.starting_position
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Position after every recorded move
    pub fn latest(&self) -> &Position {
        &self.latest
    }

    /// Rebuilds the position after the first `ply` moves.
    pub fn replay_to(&self, ply: usize) -> Result<Position> {
        if ply > self.moves.len() {
            return Err(Error::PlyOutOfRange {
                ply,
                len: self.moves.len(),
            });
        }

        let mut position = self.starting_position.clone();
        for (i, record) in self.moves[..ply].iter().enumerate() {
            position = match self.rules.apply_san(&position, &record.san) {
                Ok((next, _)) => next,
                Err(e) => {
                    warn!(ply = i + 1, san = %record.san, error = %e, "history replay failed");
                    return Err(Error::Replay {
                        ply: i + 1,
                        san: record.san.clone(),
                    });
                }
            };
        }
        Ok(position)
    }

    /// Plays a move at the end of the history.
    ///
    /// `at_ply` is the ply the caller is looking at; moves can only be
    /// added from the latest one.
    pub fn append(&mut self, at_ply: usize, spec: &MoveSpec) -> Result<&MoveRecord> {
        if at_ply != self.moves.len() {
            return Err(Error::HistoricalPly {
                at: at_ply,
                len: self.moves.len(),
            });
        }

        let (next, record) = self.rules.apply_move(&self.latest, spec)?;
        self.latest = next;
        self.moves.push(record);
        Ok(&self.moves[self.moves.len() - 1])
    }

    /// Replaces the whole record. Nothing changes unless every move is
    /// legal in sequence from `start`.
    pub fn replace_with<S: AsRef<str>>(&mut self, start: Position, sans: &[S]) -> Result<()> {
        let mut position = start.clone();
        let mut moves = Vec::with_capacity(sans.len());

        for san in sans {
            let (next, record) = self.rules.apply_san(&position, san.as_ref())?;
            position = next;
            moves.push(record);
        }

        self.starting_position = start;
        self.moves = moves;
        self.latest = position;
        Ok(())
    }

    /// Back to the default position with no moves.
    pub fn reset(&mut self) {
        let start = self.rules.default_position();
        self.starting_position = start.clone();
        self.moves.clear();
        self.latest = start;
    }
}
