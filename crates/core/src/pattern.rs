//! LIKE / ILIKE pattern compilation.
//!
//! SQL LIKE patterns are translated to an anchored pattern in a compact,
//! `no_std`-compatible regex subset and matched against whole strings:
//!
//! - `%` → `.*` (any sequence, including empty)
//! - `_` → `.` (exactly one character)
//! - `\x` escapes the next pattern character; a trailing `\` is a
//!   configuration error
//! - every other metacharacter is escaped, so it matches literally
//!
//! A pattern without wildcards degrades to plain string equality
//! (case-folded for ILIKE). ILIKE folds both pattern and candidate to
//! lowercase before matching; matching operates on Unicode scalar values.

use crate::error::{Error, Result};
use alloc::string::String;
use alloc::vec::Vec;

/// A compiled LIKE or ILIKE pattern.
#[derive(Debug, Clone)]
pub struct LikePattern {
    matcher: Matcher,
    case_insensitive: bool,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Wildcard-free pattern: plain equality.
    Literal(String),
    /// Translated anchored pattern, as a character sequence.
    Pattern(Vec<char>),
}

impl LikePattern {
    /// Compiles a LIKE pattern. `case_insensitive` selects ILIKE
    /// semantics.
    pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let mut translated: Vec<char> = Vec::with_capacity(pattern.len() + 4);
        let mut literal = String::with_capacity(pattern.len());
        let mut has_wildcard = false;

        let mut chars = pattern.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '%' => {
                    has_wildcard = true;
                    translated.push('.');
                    translated.push('*');
                }
                '_' => {
                    has_wildcard = true;
                    translated.push('.');
                }
                '\\' => match chars.next() {
                    None => return Err(Error::dangling_escape(pattern)),
                    Some(escaped) => {
                        push_literal(&mut translated, escaped, case_insensitive);
                        push_folded(&mut literal, escaped, case_insensitive);
                    }
                },
                c => {
                    push_literal(&mut translated, c, case_insensitive);
                    push_folded(&mut literal, c, case_insensitive);
                }
            }
        }

        let matcher = if has_wildcard {
            Matcher::Pattern(translated)
        } else {
            Matcher::Literal(literal)
        };
        Ok(Self {
            matcher,
            case_insensitive,
        })
    }

    /// Matches the pattern against the whole of `value`.
    pub fn matches(&self, value: &str) -> bool {
        match &self.matcher {
            Matcher::Literal(expected) => {
                if self.case_insensitive {
                    let folded: String = value.chars().flat_map(char::to_lowercase).collect();
                    folded == *expected
                } else {
                    value == expected
                }
            }
            Matcher::Pattern(pattern) => {
                let chars: Vec<char> = if self.case_insensitive {
                    value.chars().flat_map(char::to_lowercase).collect()
                } else {
                    value.chars().collect()
                };
                match_at(&chars, pattern, 0, 0)
            }
        }
    }
}

fn push_literal(out: &mut Vec<char>, ch: char, fold: bool) {
    let emit = |out: &mut Vec<char>, c: char| {
        if is_meta(c) {
            out.push('\\');
        }
        out.push(c);
    };
    if fold {
        for c in ch.to_lowercase() {
            emit(out, c);
        }
    } else {
        emit(out, ch);
    }
}

fn push_folded(out: &mut String, ch: char, fold: bool) {
    if fold {
        out.extend(ch.to_lowercase());
    } else {
        out.push(ch);
    }
}

fn is_meta(ch: char) -> bool {
    matches!(
        ch,
        '.' | '*' | '+' | '?' | '^' | '$' | '[' | ']' | '(' | ')' | '{' | '}' | '|' | '\\'
    )
}

/// Anchored match of `pattern[pi..]` against `chars[vi..]`.
///
/// The translated pattern only ever contains `.`, `\x` escapes, literal
/// characters, and the `*` quantifier, so a compact backtracking matcher
/// suffices.
fn match_at(chars: &[char], pattern: &[char], vi: usize, pi: usize) -> bool {
    if pi >= pattern.len() {
        return vi == chars.len();
    }

    let (token_len, token) = parse_token(pattern, pi);
    let next_pi = pi + token_len;
    let starred = pattern.get(next_pi) == Some(&'*');

    if starred {
        // Greedy: consume as many as possible, then backtrack.
        let mut end = vi;
        while end < chars.len() && token.matches(chars[end]) {
            end += 1;
        }
        for try_vi in (vi..=end).rev() {
            if match_at(chars, pattern, try_vi, next_pi + 1) {
                return true;
            }
        }
        false
    } else {
        vi < chars.len() && token.matches(chars[vi]) && match_at(chars, pattern, vi + 1, next_pi)
    }
}

enum Token {
    Any,
    Literal(char),
}

impl Token {
    fn matches(&self, ch: char) -> bool {
        match self {
            Token::Any => true,
            Token::Literal(c) => *c == ch,
        }
    }
}

fn parse_token(pattern: &[char], pi: usize) -> (usize, Token) {
    match pattern[pi] {
        '.' => (1, Token::Any),
        '\\' if pi + 1 < pattern.len() => (2, Token::Literal(pattern[pi + 1])),
        c => (1, Token::Literal(c)),
    }
}
