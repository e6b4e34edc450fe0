//! PGN mainline extraction
//!
//! Only what the board needs survives: the optional `[FEN]` start, the
//! mainline moves as SAN, and a few tags for logging. Comments, NAGs,
//! variations and the result marker are consumed by the pgn-reader lexer.

use pgn_reader::{RawTag, SanPlus, Skip, Visitor};
use std::io::Cursor;
use std::ops::ControlFlow;

/// The first game found in a block of PGN text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PgnGame {
    pub event: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    /// Starting position from a `[FEN "..."]` header
    pub fen: Option<String>,
    /// Mainline moves in SAN, not yet checked for legality
    pub moves: Vec<String>,
}

impl PgnGame {
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn summary(&self) -> String {
        let white = self.white.as_deref().unwrap_or("Unknown");
        let black = self.black.as_deref().unwrap_or("Unknown");
        let result = self.result.as_deref().unwrap_or("*");
        format!("{} vs {} - {}", white, black, result)
    }

    /// Whether there is anything to load: moves or a custom start.
    pub fn has_content(&self) -> bool {
        !self.moves.is_empty() || self.fen.is_some()
    }
}

struct Mainline {
    game: PgnGame,
}

struct MainlineParser;

impl Visitor for MainlineParser {
    type Tags = PgnGame;
    type Movetext = Mainline;
    type Output = PgnGame;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(PgnGame::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let name_str = String::from_utf8_lossy(name);
        let value_str = value.decode_utf8_lossy().trim().to_string();

        match name_str.as_ref() {
            "Event" => tags.event = Some(value_str),
            "White" => tags.white = Some(value_str),
            "Black" => tags.black = Some(value_str),
            "Result" => tags.result = Some(value_str),
            "FEN" if !value_str.is_empty() => tags.fen = Some(value_str),
            _ => {}
        }

        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(Mainline { game: tags })
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        movetext.game.moves.push(san.to_string());
        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        movetext.game
    }
}

#[derive(Debug)]
pub enum PgnError {
    NoGamesFound,
    ParseError(String),
}

impl std::fmt::Display for PgnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PgnError::NoGamesFound => write!(f, "No game found in PGN"),
            PgnError::ParseError(s) => write!(f, "Parse error: {}", s),
        }
    }
}

impl std::error::Error for PgnError {}

/// Reads the first game of a PGN block.
///
/// Fails when a mainline token could not be read as a move; the lexer
/// would otherwise skip it and hand back a shortened game.
pub fn parse_pgn_string(pgn: &str) -> Result<PgnGame, PgnError> {
    let mut parser = MainlineParser;
    let cursor = Cursor::new(pgn.as_bytes());
    let mut reader = pgn_reader::Reader::new(cursor);

    let game = match reader.read_game(&mut parser) {
        Ok(Some(game)) => game,
        Ok(None) => return Err(PgnError::NoGamesFound),
        Err(e) => return Err(PgnError::ParseError(e.to_string())),
    };

    let expected = mainline_move_tokens(pgn);
    if expected != game.moves.len() {
        return Err(PgnError::ParseError(format!(
            "unreadable move after {} of {} mainline moves",
            game.moves.len(),
            expected
        )));
    }
    Ok(game)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Movetext,
    Tag,
    TagValue,
    BraceComment,
    LineComment,
}

/// Counts the mainline tokens of the first game that should be moves.
///
/// Tags, comments, variations, move numbers, NAGs and lone annotation
/// glyphs are skipped; counting stops at the result marker.
fn mainline_move_tokens(pgn: &str) -> usize {
    let mut state = Lexeme::Movetext;
    let mut depth = 0usize;
    let mut count = 0;
    let mut token = String::new();
    let mut escaped = false;

    for c in pgn.chars() {
        match state {
            Lexeme::Tag => match c {
                '"' => state = Lexeme::TagValue,
                ']' => state = Lexeme::Movetext,
                _ => {}
            },
            Lexeme::TagValue => match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => state = Lexeme::Tag,
                _ => {}
            },
            Lexeme::BraceComment => {
                if c == '}' {
                    state = Lexeme::Movetext;
                }
            }
            Lexeme::LineComment => {
                if c == '\n' {
                    state = Lexeme::Movetext;
                }
            }
            Lexeme::Movetext => {
                let boundary = c.is_whitespace() || matches!(c, '[' | '{' | ';' | '(' | ')');
                if !boundary {
                    token.push(c);
                    continue;
                }

                if depth == 0 {
                    match classify_token(&token) {
                        Token::Move => count += 1,
                        Token::Result => return count,
                        Token::Other => {}
                    }
                }
                token.clear();

                match c {
                    '[' if depth == 0 => state = Lexeme::Tag,
                    '{' => state = Lexeme::BraceComment,
                    ';' => state = Lexeme::LineComment,
                    '(' => depth += 1,
                    ')' => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
        }
    }

    if state == Lexeme::Movetext && depth == 0 && classify_token(&token) == Token::Move {
        count += 1;
    }
    count
}

#[derive(PartialEq, Eq)]
enum Token {
    Move,
    Result,
    Other,
}

fn classify_token(token: &str) -> Token {
    if matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*") {
        return Token::Result;
    }

    // strip a move number such as `12.` or `7...`
    let digits = token.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = if digits.len() < token.len() && digits.starts_with('.') {
        digits.trim_start_matches('.')
    } else {
        token
    };

    if rest.is_empty() || rest.starts_with('$') || rest.chars().all(|c| c == '!' || c == '?') {
        Token::Other
    } else {
        Token::Move
    }
}
