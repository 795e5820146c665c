//! Record splitting.
//!
//! Finds the text of each record in a BibTeX or RIS document. BibTeX
//! records are delimited by tracking brace depth, so values protected with
//! nested braces (`{The {DNA} of {\LaTeX}}`) do not end a record early.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::extract::ParseError;
use crate::format::{Format, RIS_END_TAG, RIS_TYPE_TAG};

lazy_static! {
    static ref RIS_LINE: Regex =
        Regex::new(r"^\s*([A-Za-z][A-Za-z0-9])\s*-\s*(.*?)\s*$").unwrap();
}

/// Leading marker written by some exporters; never part of a record.
const BYTE_ORDER_MARK: char = '\u{feff}';

/// BibTeX `@` blocks that are not bibliographic records.
const DIRECTIVES: &[&str] = &["comment", "preamble", "string"];

/// Returns a lazy iterator over the records of `text`.
///
/// Each item is the full text of one record, or an error for a BibTeX
/// record whose braces never balance. The iterator is `Clone`, so a pass
/// can be restarted from any point.
pub fn split_records(text: &str, format: Format) -> Records<'_> {
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
    Records {
        text,
        pos: 0,
        format,
    }
}

/// Iterator returned by [`split_records`].
#[derive(Debug, Clone)]
pub struct Records<'a> {
    text: &'a str,
    pos: usize,
    format: Format,
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<&'a str, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.format {
            Format::Bibtex => self.next_bibtex(),
            Format::Ris => self.next_ris(),
        }
    }
}

impl<'a> Records<'a> {
    fn next_bibtex(&mut self) -> Option<Result<&'a str, ParseError>> {
        let text = self.text;

        while self.pos < text.len() {
            let at = match text[self.pos..].find('@') {
                Some(offset) => self.pos + offset,
                None => {
                    self.pos = text.len();
                    return None;
                }
            };

            let Some((kind, open)) = bibtex_header_at(text, at) else {
                self.pos = at + 1;
                continue;
            };
            let is_directive = DIRECTIVES.contains(&kind.to_ascii_lowercase().as_str());

            let outcome = match scan_braces(text, open, true) {
                BraceScan::Closed(close) => {
                    self.pos = close + 1;
                    Ok(&text[at..=close])
                }
                BraceScan::Interrupted(next) => {
                    self.pos = next;
                    Err(ParseError::UnbalancedDelimiter {
                        line: line_at(text, at),
                    })
                }
                BraceScan::Unterminated => {
                    self.pos = at + 1;
                    Err(ParseError::UnbalancedDelimiter {
                        line: line_at(text, at),
                    })
                }
            };

            if is_directive {
                debug!("skipping @{} block at line {}", kind, line_at(text, at));
                continue;
            }
            return Some(outcome);
        }

        None
    }

    fn next_ris(&mut self) -> Option<Result<&'a str, ParseError>> {
        let text = self.text;
        let mut start: Option<usize> = None;
        let mut cursor = self.pos;

        while cursor < text.len() {
            let line_end = text[cursor..]
                .find('\n')
                .map(|i| cursor + i + 1)
                .unwrap_or(text.len());

            if let Some((tag, _)) = parse_tag_line(&text[cursor..line_end]) {
                match (start, tag.as_str()) {
                    (None, RIS_TYPE_TAG) => start = Some(cursor),
                    (Some(s), RIS_TYPE_TAG) => {
                        // A new record began before the previous one ended.
                        self.pos = cursor;
                        return Some(Ok(text[s..cursor].trim_end()));
                    }
                    (Some(s), RIS_END_TAG) => {
                        self.pos = line_end;
                        return Some(Ok(text[s..line_end].trim_end()));
                    }
                    _ => {}
                }
            }
            cursor = line_end;
        }

        self.pos = text.len();
        start.map(|s| Ok(text[s..].trim_end()))
    }
}

/// Outcome of scanning a brace group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BraceScan {
    /// Index of the balancing `}`
    Closed(usize),
    /// Index of a record header found on a new line while still open
    Interrupted(usize),
    /// Input ended while still open
    Unterminated,
}

/// Scans from the `{` at `open` to its balancing `}`, counting depth.
///
/// With `stop_at_header`, a line beginning with a BibTeX record header while
/// the group is open ends the scan.
fn scan_braces(text: &str, open: usize, stop_at_header: bool) -> BraceScan {
    let bytes = text.as_bytes();
    let mut depth = 0usize;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return BraceScan::Closed(i);
                }
            }
            b'\n' if stop_at_header => {
                let next = i + 1 + count_leading_blanks(&bytes[i + 1..]);
                if bytes.get(next) == Some(&b'@') && bibtex_header_at(text, next).is_some() {
                    return BraceScan::Interrupted(next);
                }
            }
            _ => {}
        }
    }

    BraceScan::Unterminated
}

/// Index of the `}` balancing the `{` at `open`, if the group closes.
pub(crate) fn matching_brace(text: &str, open: usize) -> Option<usize> {
    match scan_braces(text, open, false) {
        BraceScan::Closed(close) => Some(close),
        _ => None,
    }
}

/// Recognises `@type{` at `at`, returning the type name and the index of
/// the opening brace.
pub(crate) fn bibtex_header_at(text: &str, at: usize) -> Option<(&str, usize)> {
    let rest = text.get(at..)?.strip_prefix('@')?;
    let after_at = at + 1;

    let skipped = rest.len() - rest.trim_start().len();
    let name_start = after_at + skipped;
    let name_len = text[name_start..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len() - name_start);
    if name_len == 0 {
        return None;
    }
    let name_end = name_start + name_len;

    let after_name = &text[name_end..];
    let open = name_end + (after_name.len() - after_name.trim_start().len());
    if text[open..].starts_with('{') {
        Some((&text[name_start..name_end], open))
    } else {
        None
    }
}

/// Splits a RIS line into its upper-cased tag and trimmed value.
pub(crate) fn parse_tag_line(line: &str) -> Option<(String, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let caps = RIS_LINE.captures(line)?;
    let tag = caps.get(1)?.as_str().to_ascii_uppercase();
    let value = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    Some((tag, value))
}

/// 1-based line number of a byte offset.
pub(crate) fn line_at(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn count_leading_blanks(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r'))
        .count()
}
