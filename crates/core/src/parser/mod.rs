//! Parser module for text pasted into the board
//!
//! Supports:
//! - PGN (Portable Game Notation), mainline only
//! - FEN position records

pub mod fen;
pub mod pgn;

use tracing::debug;

pub use fen::looks_like_fen;
pub use pgn::{parse_pgn_string, PgnError, PgnGame};

/// One way of reading imported text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportCandidate {
    Game(PgnGame),
    Position(String),
}

/// Text with a tag bracket or a move-number period is read as PGN first.
pub fn looks_like_pgn(text: &str) -> bool {
    text.contains('[') || text.contains('.')
}

/// The interpretations of `text` worth trying, in order.
///
/// PGN comes first when the text looks like PGN and actually contains
/// moves or a starting position. FEN follows when the text has FEN shape
/// or does not look like PGN at all.
pub fn import_candidates(text: &str) -> Vec<ImportCandidate> {
    let text = text.trim();
    let mut candidates = Vec::new();
    if text.is_empty() {
        return candidates;
    }

    let pgn_like = looks_like_pgn(text);
    if pgn_like {
        match parse_pgn_string(text) {
            Ok(game) if game.has_content() => candidates.push(ImportCandidate::Game(game)),
            Ok(_) => debug!("PGN has no moves after cleanup"),
            Err(e) => debug!(error = %e, "PGN parse failed"),
        }
    }

    if looks_like_fen(text) || !pgn_like {
        candidates.push(ImportCandidate::Position(text.to_string()));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fen_only() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        assert_eq!(
            import_candidates(fen),
            vec![ImportCandidate::Position(fen.to_string())]
        );
    }

    #[test]
    fn test_movetext_only() {
        let candidates = import_candidates("  1. e4 e5 2. Nf3 ");
        match &candidates[..] {
            [ImportCandidate::Game(game)] => assert_eq!(game.moves.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_text_falls_back_to_fen() {
        assert_eq!(
            import_candidates("hello"),
            vec![ImportCandidate::Position("hello".to_string())]
        );
    }

    #[test]
    fn test_empty() {
        assert!(import_candidates("   ").is_empty());
    }
}
