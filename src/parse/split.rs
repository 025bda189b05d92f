//! Quote- and escape-aware scanning primitives.
//!
//! All three scanners share one state machine: a single quote toggles only
//! outside double quotes, a double quote toggles only outside single quotes,
//! and a backslash outside single quotes makes the next character literal.
//! Escaping backslashes are kept in the output; removing them is the job of
//! [`tokenize`](super::tokenize::tokenize).
//!
//! Unterminated quotes are tolerated: the state stays open to the end of the
//! input and no characters are dropped.

/// Scanner state carried across characters.
#[derive(Debug, Default, Clone, Copy)]
struct QuoteState {
    sq: bool,
    dq: bool,
    esc: bool,
}

impl QuoteState {
    /// Feed one character. Returns `true` when `c` is structural, i.e. it is
    /// outside any quotes, not escaped, and not itself a quote or escape.
    fn advance(&mut self, c: char) -> bool {
        if self.esc {
            self.esc = false;
            return false;
        }
        if c == '\\' && !self.sq {
            self.esc = true;
            return false;
        }
        if c == '\'' && !self.dq {
            self.sq = !self.sq;
            return false;
        }
        if c == '"' && !self.sq {
            self.dq = !self.dq;
            return false;
        }
        !(self.sq || self.dq)
    }
}

/// Byte index of the first occurrence of `target` outside quotes and not
/// escaped, or `None`.
pub fn find_unquoted_char(s: &str, target: char) -> Option<usize> {
    let mut state = QuoteState::default();
    for (i, c) in s.char_indices() {
        if state.advance(c) && c == target {
            return Some(i);
        }
    }
    None
}

/// Split `s` at every unquoted, unescaped `separator`.
///
/// Segments are returned untrimmed. An empty input yields no segments; a
/// trailing separator yields a trailing empty segment.
pub fn split_by_unquoted_char(s: &str, separator: char) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut state = QuoteState::default();

    for c in s.chars() {
        if state.advance(c) && c == separator {
            parts.push(std::mem::take(&mut buf));
            continue;
        }
        buf.push(c);
    }
    parts.push(buf);

    parts
}

/// Byte spans of the whitespace-delimited words of `s`, quote-aware.
///
/// Quotes and escapes stay inside the span; whitespace inside quotes does
/// not end a word.
pub fn word_spans(s: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut state = QuoteState::default();

    for (i, c) in s.char_indices() {
        let structural = state.advance(c);
        if structural && c.is_whitespace() {
            if let Some(begin) = start.take() {
                spans.push((begin, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(begin) = start {
        spans.push((begin, s.len()));
    }

    spans
}

/// Whether `line` ends in a backslash that is not itself escaped.
pub fn ends_with_unescaped_backslash(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
    trailing % 2 == 1
}
