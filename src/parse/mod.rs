// src/parse/mod.rs
//! Line-oriented parsers for the four source kinds (`dart`, `news`, `forum`, `market`).
//!
//! Every parser is a pure function of its input text and never fails: lines
//! that do not fit a known shape are dropped (or, for filings, simply do not
//! populate a field). Parsers are safe to call concurrently.

pub mod dart;
pub mod forum;
pub mod market;
pub mod news;

pub use dart::parse_dart;
pub use forum::parse_forum;
pub use market::parse_market;
pub use news::parse_news;

/// Outcome of trying one line shape against one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineMatch<T> {
    Matched(T),
    Unmatched,
}

impl<T> LineMatch<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Matched(v) => Some(v),
            Self::Unmatched => None,
        }
    }
}

impl<T> From<Option<T>> for LineMatch<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Self::Matched(v),
            None => Self::Unmatched,
        }
    }
}

/// A named line shape. Matchers in a list are tried in declared order and the
/// first `Matched` wins; later matchers never see that line.
pub struct LineMatcher<I: ?Sized, T> {
    pub name: &'static str,
    pub try_match: fn(&I) -> LineMatch<T>,
}

/// Run `matchers` in order over `input`, returning the first hit.
pub fn first_match<I: ?Sized, T>(matchers: &[LineMatcher<I, T>], input: &I) -> Option<(&'static str, T)> {
    matchers.iter().find_map(|m| match (m.try_match)(input) {
        LineMatch::Matched(v) => Some((m.name, v)),
        LineMatch::Unmatched => None,
    })
}

/// Split on `\n` and keep lines with non-whitespace content. Lines are not trimmed.
pub fn non_blank_lines(content: &str) -> impl Iterator<Item = &str> + '_ {
    content.split('\n').filter(|l| !l.trim().is_empty())
}

/// Pipe-delimited fields, each trimmed.
pub(crate) fn pipe_fields(line: &str) -> Vec<&str> {
    line.split('|').map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_blank_lines_skips_whitespace_only() {
        let lines: Vec<&str> = non_blank_lines("a\n   \n\n b \n\t").collect();
        assert_eq!(lines, vec!["a", " b "]);
    }

    #[test]
    fn first_match_respects_declared_order() {
        fn any_len(s: &str) -> LineMatch<usize> {
            LineMatch::Matched(s.len())
        }
        fn never(_: &str) -> LineMatch<usize> {
            LineMatch::Unmatched
        }
        fn always_zero(_: &str) -> LineMatch<usize> {
            LineMatch::Matched(0)
        }
        let matchers: [LineMatcher<str, usize>; 3] = [
            LineMatcher { name: "never", try_match: never },
            LineMatcher { name: "len", try_match: any_len },
            LineMatcher { name: "zero", try_match: always_zero },
        ];
        assert_eq!(first_match(&matchers, "abc"), Some(("len", 3)));
    }
}
