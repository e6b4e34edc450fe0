//! Chess rules adapter
//!
//! The board only ever talks to the rules engine through [`Rules`]:
//! load a position, list legal moves, apply a move. [`StandardRules`]
//! backs it with shakmaty.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus, Suffix};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position as _, Role, Square};

use crate::error::{Error, Result};

/// FEN of the standard starting position
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A position the rules adapter has accepted, stored as FEN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    fen: String,
    turn: Color,
}

impl Position {
    /// Wraps a FEN that a [`Rules`] implementation has already validated.
    pub fn validated(fen: String, turn: Color) -> Self {
        Position { fen, turn }
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    /// Side to move
    pub fn turn(&self) -> Color {
        self.turn
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fen)
    }
}

/// A move that has been applied to a position. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    /// Standard algebraic notation, including check suffix
    pub san: String,
    /// Long algebraic notation as sent over UCI
    pub uci: String,
    /// Side that made the move
    pub color: Color,
}

/// A move request coming from the board widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSpec {
    pub from: Square,
    pub to: Square,
    /// Piece to promote to; a queen is assumed when omitted.
    pub promotion: Option<Role>,
}

impl MoveSpec {
    pub fn new(from: Square, to: Square) -> Self {
        MoveSpec { from, to, promotion: None }
    }

    fn matches(&self, m: &Move) -> bool {
        if m.from() != Some(self.from) {
            return false;
        }
        // Castling may arrive as king-to-destination or king-takes-rook
        if m.to() != self.to && standard_destination(m) != self.to {
            return false;
        }
        let wanted = match (self.promotion, m.promotion()) {
            (Some(role), _) => Some(role),
            (None, Some(_)) => Some(Role::Queen),
            (None, None) => None,
        };
        m.promotion() == wanted
    }
}

impl FromStr for MoveSpec {
    type Err = Error;

    /// Parses long algebraic notation such as `e2e4` or `e7e8n`.
    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<UciMove>() {
            Ok(UciMove::Normal { from, to, promotion }) => Ok(MoveSpec { from, to, promotion }),
            _ => Err(Error::IllegalMove(s.to_string())),
        }
    }
}

/// One legal move, as origin and destination squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegalMove {
    pub from: Square,
    pub to: Square,
}

/// Legal destinations keyed by origin square
pub type Dests = BTreeMap<Square, Vec<Square>>;

/// Groups legal moves by origin square, dropping duplicate destinations
/// produced by the different promotion pieces.
pub fn destinations(moves: &[LegalMove]) -> Dests {
    let mut dests = Dests::new();
    for m in moves {
        let targets = dests.entry(m.from).or_default();
        if !targets.contains(&m.to) {
            targets.push(m.to);
        }
    }
    dests
}

/// Basic facts about a position shown next to the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionStatus {
    pub side_to_move: Color,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_stalemate: bool,
}

/// The narrow interface the board needs from a rules engine.
pub trait Rules {
    /// The position a new game starts from
    fn default_position(&self) -> Position;

    /// Validates and normalizes a FEN string.
    fn load_position(&self, text: &str) -> Result<Position>;

    fn legal_moves(&self, position: &Position) -> Vec<LegalMove>;

    fn status(&self, position: &Position) -> Result<PositionStatus>;

    /// Applies a board move; fails with [`Error::IllegalMove`] if it is not legal.
    fn apply_move(&self, position: &Position, spec: &MoveSpec) -> Result<(Position, MoveRecord)>;

    /// Applies a move written in SAN. Long algebraic (`e2e4`) is accepted too.
    fn apply_san(&self, position: &Position, san: &str) -> Result<(Position, MoveRecord)>;
}

/// Standard chess rules backed by shakmaty
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    fn setup(&self, text: &str) -> Result<Chess> {
        let fen: Fen = text
            .trim()
            .parse()
            .map_err(|e: shakmaty::fen::ParseFenError| Error::InvalidPosition(e.to_string()))?;
        fen.into_position::<Chess>(CastlingMode::Standard)
            .map_err(|e| Error::InvalidPosition(e.to_string()))
    }

    fn play(&self, chess: Chess, m: Move) -> Result<(Position, MoveRecord)> {
        let from = m.from().ok_or_else(|| Error::IllegalMove(format!("{:?}", m)))?;
        let color = chess.turn();
        let san = San::from_move(&chess, m.clone());
        let uci = m.to_uci(CastlingMode::Standard).to_string();
        let to = standard_destination(&m);

        let next = chess
            .play(m)
            .map_err(|e| Error::IllegalMove(e.to_string()))?;
        let san = SanPlus {
            san,
            suffix: Suffix::from_position(&next),
        };

        let record = MoveRecord {
            from,
            to,
            san: san.to_string(),
            uci,
            color,
        };
        Ok((to_position(&next), record))
    }
}

impl Rules for StandardRules {
    fn default_position(&self) -> Position {
        to_position(&Chess::default())
    }

    fn load_position(&self, text: &str) -> Result<Position> {
        self.setup(text).map(|chess| to_position(&chess))
    }

    fn legal_moves(&self, position: &Position) -> Vec<LegalMove> {
        let chess = match self.setup(position.fen()) {
            Ok(chess) => chess,
            Err(_) => return Vec::new(),
        };
        chess
            .legal_moves()
            .iter()
            .filter_map(|m| {
                m.from().map(|from| LegalMove {
                    from,
                    to: standard_destination(m),
                })
            })
            .collect()
    }

    fn status(&self, position: &Position) -> Result<PositionStatus> {
        let chess = self.setup(position.fen())?;
        Ok(PositionStatus {
            side_to_move: chess.turn(),
            is_check: chess.is_check(),
            is_checkmate: chess.is_checkmate(),
            is_stalemate: chess.is_stalemate(),
        })
    }

    fn apply_move(&self, position: &Position, spec: &MoveSpec) -> Result<(Position, MoveRecord)> {
        let chess = self.setup(position.fen())?;
        let found = chess
            .legal_moves()
            .iter()
            .find(|m| spec.matches(m))
            .cloned();

        match found {
            Some(m) => self.play(chess, m),
            None => Err(Error::IllegalMove(format!("{}{}", spec.from, spec.to))),
        }
    }

    fn apply_san(&self, position: &Position, san: &str) -> Result<(Position, MoveRecord)> {
        let chess = self.setup(position.fen())?;
        let illegal = || Error::IllegalMove(san.to_string());

        let m = match san.parse::<SanPlus>() {
            Ok(parsed) => parsed.san.to_move(&chess).map_err(|_| illegal())?,
            Err(_) => {
                let uci: UciMove = san.parse().map_err(|_| illegal())?;
                uci.to_move(&chess).map_err(|_| illegal())?
            }
        };
        self.play(chess, m)
    }
}

fn to_position(chess: &Chess) -> Position {
    Position::validated(
        Fen::from_position(chess, EnPassantMode::Legal).to_string(),
        chess.turn(),
    )
}

/// Destination as the board shows it: castling lands on the king's square.
fn standard_destination(m: &Move) -> Square {
    match m.to_uci(CastlingMode::Standard) {
        UciMove::Normal { to, .. } => to,
        _ => m.to(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_all(rules: &StandardRules, moves: &[&str]) -> Position {
        let mut pos = rules.default_position();
        for m in moves {
            let spec: MoveSpec = m.parse().unwrap();
            pos = rules.apply_move(&pos, &spec).unwrap().0;
        }
        pos
    }

    #[test]
    fn test_default_position() {
        let rules = StandardRules;
        let pos = rules.default_position();
        assert_eq!(pos.fen(), START_FEN);
        assert_eq!(pos.turn(), Color::White);
        assert_eq!(rules.legal_moves(&pos).len(), 20);
    }

    #[test]
    fn test_apply_move_records_san() {
        let rules = StandardRules;
        let pos = rules.default_position();
        let (next, record) = rules.apply_move(&pos, &"g1f3".parse().unwrap()).unwrap();

        assert_eq!(record.san, "Nf3");
        assert_eq!(record.uci, "g1f3");
        assert_eq!(record.color, Color::White);
        assert_eq!(next.turn(), Color::Black);
    }

    #[test]
    fn test_illegal_move_rejected() {
        let rules = StandardRules;
        let pos = rules.default_position();
        let result = rules.apply_move(&pos, &"e2e5".parse().unwrap());
        assert!(matches!(result, Err(Error::IllegalMove(_))));
    }

    #[test]
    fn test_castling_destinations() {
        let rules = StandardRules;
        let pos = play_all(&rules, &["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6"]);

        let dests = destinations(&rules.legal_moves(&pos));
        assert!(dests[&Square::E1].contains(&Square::G1));

        let (_, record) = rules.apply_move(&pos, &MoveSpec::new(Square::E1, Square::G1)).unwrap();
        assert_eq!(record.san, "O-O");
        assert_eq!(record.to, Square::G1);

        // king-takes-rook form used by some board widgets
        let (_, record) = rules.apply_move(&pos, &MoveSpec::new(Square::E1, Square::H1)).unwrap();
        assert_eq!(record.san, "O-O");
    }

    #[test]
    fn test_promotion_defaults_to_queen() {
        let rules = StandardRules;
        let pos = rules.load_position("8/4P3/8/8/8/8/k7/4K3 w - - 0 1").unwrap();

        let (_, record) = rules.apply_move(&pos, &"e7e8".parse().unwrap()).unwrap();
        assert!(record.san.starts_with("e8=Q"));

        let (_, record) = rules.apply_move(&pos, &"e7e8n".parse().unwrap()).unwrap();
        assert!(record.san.starts_with("e8=N"));

        // four promotion pieces collapse to one destination
        let dests = destinations(&rules.legal_moves(&pos));
        assert_eq!(dests[&Square::E7], vec![Square::E8]);
    }

    #[test]
    fn test_apply_san_and_long_algebraic() {
        let rules = StandardRules;
        let pos = rules.default_position();

        let (after_san, _) = rules.apply_san(&pos, "e4").unwrap();
        let (after_uci, _) = rules.apply_san(&pos, "e2e4").unwrap();
        assert_eq!(after_san, after_uci);

        assert!(rules.apply_san(&pos, "Ke2").is_err());
        assert!(rules.apply_san(&pos, "hello").is_err());
    }

    #[test]
    fn test_check_suffix() {
        let rules = StandardRules;
        let pos = play_all(&rules, &["f2f3", "e7e5", "g2g4"]);
        let (next, record) = rules.apply_san(&pos, "Qh4").unwrap();

        assert_eq!(record.san, "Qh4#");
        let status = rules.status(&next).unwrap();
        assert!(status.is_checkmate);
        assert_eq!(status.side_to_move, Color::White);
    }

    #[test]
    fn test_load_position_rejects_garbage() {
        let rules = StandardRules;
        assert!(rules.load_position("not a fen").is_err());
        // two white kings
        assert!(rules.load_position("4k3/8/8/8/8/8/8/K3K3 w - - 0 1").is_err());
    }
}
