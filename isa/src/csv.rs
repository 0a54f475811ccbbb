use crate::error::{Error, Result};

const QUOTE: char = '"';

/// Split one CSV line into fields.
///
/// A piece holding a single `"` opens a quoted span that runs up to the next
/// piece containing a `"`; the commas in between are kept and every quote
/// character of the span is dropped. A piece holding exactly two quotes is a
/// self-contained quoted field.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut pieces = line.split(',');

    while let Some(piece) = pieces.next() {
        match count_quotes(piece) {
            0 => tokens.push(piece.to_string()),
            1 => {
                let mut span = piece.to_string();
                loop {
                    let next = pieces
                        .next()
                        .ok_or_else(|| Error::UnterminatedQuote(piece.to_string()))?;
                    span.push(',');
                    span.push_str(next);
                    if next.contains(QUOTE) {
                        break;
                    }
                }
                tokens.push(strip_quotes(&span));
            }
            2 => tokens.push(strip_quotes(piece)),
            quotes => {
                return Err(Error::Tokenize {
                    piece: piece.to_string(),
                    quotes,
                })
            }
        }
    }
    Ok(tokens)
}

fn count_quotes(piece: &str) -> usize {
    piece.chars().filter(|&c| c == QUOTE).count()
}

fn strip_quotes(text: &str) -> String {
    text.chars().filter(|&c| c != QUOTE).collect()
}
