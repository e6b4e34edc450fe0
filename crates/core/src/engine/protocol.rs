//! UCI wire format
//!
//! Outgoing commands render to exactly one line; incoming lines are
//! classified into [`EngineOutput`] without ever failing.

use std::fmt;

/// A command sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// `uci` -- identification handshake
    Uci,
    /// `isready` -- synchronization check
    IsReady,
    SetOption { name: String, value: String },
    /// `position fen <fen>`
    Position { fen: String },
    /// `go infinite`
    GoInfinite,
    Stop,
    Quit,
}

impl EngineCommand {
    pub fn set_option(name: &str, value: impl ToString) -> Self {
        EngineCommand::SetOption {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Whether the engine answers this command with a terminal line.
    pub fn completion(&self) -> Option<Completion> {
        match self {
            EngineCommand::Uci => Some(Completion::UciOk),
            EngineCommand::IsReady => Some(Completion::ReadyOk),
            EngineCommand::GoInfinite => Some(Completion::BestMove),
            _ => None,
        }
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::Uci => write!(f, "uci"),
            EngineCommand::IsReady => write!(f, "isready"),
            EngineCommand::SetOption { name, value } => {
                write!(f, "setoption name {} value {}", name, value)
            }
            EngineCommand::Position { fen } => write!(f, "position fen {}", fen),
            EngineCommand::GoInfinite => write!(f, "go infinite"),
            EngineCommand::Stop => write!(f, "stop"),
            EngineCommand::Quit => write!(f, "quit"),
        }
    }
}

/// The terminal line that completes a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    UciOk,
    ReadyOk,
    BestMove,
}

/// Score as reported by the engine, from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Cp(i32),
    Mate(i32),
}

/// A parsed `info` line that carries a score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLine {
    pub score: Score,
    pub depth: u32,
    /// `multipv` rank, 1-based
    pub rank: Option<u32>,
    /// Principal variation in UCI notation
    pub pv: Vec<String>,
}

/// One classified line of engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutput {
    UciOk,
    ReadyOk,
    BestMove { mv: String, ponder: Option<String> },
    Info(InfoLine),
    /// Anything else: id/option lines, info without a score, malformed input
    Ignored,
}

impl EngineOutput {
    /// Classifies a raw line.
    ///
    /// With `multi_variation` set, an `info` line must carry a `multipv`
    /// rank to count as analysis output.
    pub fn classify(line: &str, multi_variation: bool) -> Self {
        let line = line.trim();
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            Some("uciok") => EngineOutput::UciOk,
            Some("readyok") => EngineOutput::ReadyOk,
            Some("bestmove") => match tokens.next() {
                Some(mv) => {
                    let ponder = match tokens.next() {
                        Some("ponder") => tokens.next().map(str::to_string),
                        _ => None,
                    };
                    EngineOutput::BestMove {
                        mv: mv.to_string(),
                        ponder,
                    }
                }
                None => EngineOutput::Ignored,
            },
            Some("info") => match parse_info(line) {
                Some(info) if info.rank.is_some() || !multi_variation => EngineOutput::Info(info),
                _ => EngineOutput::Ignored,
            },
            _ => EngineOutput::Ignored,
        }
    }

    /// The completion marker this line represents, if any.
    pub fn completion(&self) -> Option<Completion> {
        match self {
            EngineOutput::UciOk => Some(Completion::UciOk),
            EngineOutput::ReadyOk => Some(Completion::ReadyOk),
            EngineOutput::BestMove { .. } => Some(Completion::BestMove),
            _ => None,
        }
    }
}

/// Parses an info line such as
/// `info depth 12 seldepth 16 multipv 1 score cp 34 nodes 9000 pv e2e4 e7e5`.
///
/// Returns `None` when there is no usable score.
fn parse_info(line: &str) -> Option<InfoLine> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut score = None;
    let mut depth = 0;
    let mut rank = None;
    let mut pv = Vec::new();
    let mut i = 1;

    while i < parts.len() {
        match parts[i] {
            "depth" => {
                depth = parts.get(i + 1).and_then(|d| d.parse().ok()).unwrap_or(0);
                i += 2;
            }
            "multipv" => {
                rank = parts.get(i + 1).and_then(|r| r.parse().ok());
                i += 2;
            }
            "score" => {
                let value = parts.get(i + 2).and_then(|v| v.parse::<i32>().ok());
                score = match (parts.get(i + 1).copied(), value) {
                    (Some("cp"), Some(cp)) => Some(Score::Cp(cp)),
                    (Some("mate"), Some(m)) => Some(Score::Mate(m)),
                    _ => None,
                };
                i += 3;
            }
            "pv" => {
                // everything after "pv" is the variation
                pv = parts[i + 1..].iter().map(|s| s.to_string()).collect();
                break;
            }
            // free text until end of line
            "string" => break,
            _ => {
                i += 1;
            }
        }
    }

    score.map(|score| InfoLine {
        score,
        depth,
        rank,
        pv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines() {
        assert_eq!(EngineCommand::Uci.to_string(), "uci");
        assert_eq!(
            EngineCommand::set_option("MultiPV", 5).to_string(),
            "setoption name MultiPV value 5"
        );
        assert_eq!(
            EngineCommand::set_option("Use NNUE", true).to_string(),
            "setoption name Use NNUE value true"
        );
        assert_eq!(
            EngineCommand::Position {
                fen: "8/8/8/8/8/8/8/K1k5 w - - 0 1".into()
            }
            .to_string(),
            "position fen 8/8/8/8/8/8/8/K1k5 w - - 0 1"
        );
        assert_eq!(EngineCommand::GoInfinite.to_string(), "go infinite");
    }

    #[test]
    fn test_classify_handshake() {
        assert_eq!(EngineOutput::classify("uciok", true), EngineOutput::UciOk);
        assert_eq!(EngineOutput::classify("  readyok\r", true), EngineOutput::ReadyOk);
        assert_eq!(
            EngineOutput::classify("id name Stockfish 17", true),
            EngineOutput::Ignored
        );
    }

    #[test]
    fn test_classify_bestmove() {
        assert_eq!(
            EngineOutput::classify("bestmove e2e4 ponder e7e5", true),
            EngineOutput::BestMove {
                mv: "e2e4".into(),
                ponder: Some("e7e5".into())
            }
        );
        assert_eq!(
            EngineOutput::classify("bestmove (none)", true),
            EngineOutput::BestMove {
                mv: "(none)".into(),
                ponder: None
            }
        );
        assert_eq!(EngineOutput::classify("bestmove", true), EngineOutput::Ignored);
    }

    #[test]
    fn test_classify_info() {
        let line = "info depth 12 seldepth 17 multipv 1 score cp 34 nodes 91234 nps 1000 pv e2e4 e7e5 g1f3";
        match EngineOutput::classify(line, true) {
            EngineOutput::Info(info) => {
                assert_eq!(info.score, Score::Cp(34));
                assert_eq!(info.depth, 12);
                assert_eq!(info.rank, Some(1));
                assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
            }
            other => panic!("expected Info, got {:?}", other),
        }

        match EngineOutput::classify("info depth 20 multipv 2 score mate -3 pv h7h6", true) {
            EngineOutput::Info(info) => assert_eq!(info.score, Score::Mate(-3)),
            other => panic!("expected Info, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_requires_rank_in_multi_variation_mode() {
        let line = "info depth 5 score cp 10 pv e2e4";
        assert_eq!(EngineOutput::classify(line, true), EngineOutput::Ignored);
        assert!(matches!(
            EngineOutput::classify(line, false),
            EngineOutput::Info(_)
        ));
    }

    #[test]
    fn test_classify_malformed_info() {
        for line in [
            "info depth 3 currmove e2e4 currmovenumber 1",
            "info string NNUE evaluation using nn-1111.nnue",
            "info depth 3 multipv 1 score cp",
            "info depth 3 multipv 1 score cp abc pv e2e4",
            "info score",
            "info",
            "",
        ] {
            assert_eq!(EngineOutput::classify(line, true), EngineOutput::Ignored, "{}", line);
        }
    }
}
