//! Structural FEN check
//!
//! Cheap shape test run before handing text to the rules adapter: eight
//! slash-separated ranks and four to six space-separated fields.

/// Number of rank fields in the board part
const RANKS: usize = 8;

/// Whether `text` has the shape of a FEN record.
pub fn looks_like_fen(text: &str) -> bool {
    if text.contains('[') {
        return false;
    }

    let fields: Vec<&str> = text.split_whitespace().collect();
    if !(4..=6).contains(&fields.len()) {
        return false;
    }

    fields[0].split('/').count() == RANKS
        && matches!(fields[1], "w" | "b")
}
