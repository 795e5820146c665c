//! Field extraction.
//!
//! Turns the text of one record into an [`EntryRecord`] holding raw,
//! unnormalized values.

use thiserror::Error;

use crate::format::{Format, RIS_END_TAG, RIS_ID_TAG, RIS_JOIN, RIS_TYPE_TAG};
use crate::record::EntryRecord;
use crate::split::{bibtex_header_at, line_at, matching_brace, parse_tag_line};

/// Errors that make a single record unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("record has no recognizable @type{{key, header")]
    MissingHeader,

    #[error("record has no entry type")]
    MissingType,

    #[error("unbalanced delimiter in record starting at line {line}")]
    UnbalancedDelimiter { line: usize },

    #[error("malformed field near '{0}'")]
    MalformedField(String),
}

/// Extracts the entry type, key and raw field values of one record.
///
/// BibTeX field names are lower-cased. Repeated RIS tags are folded into a
/// single value joined with `" and "` so later stages can split them again.
///
/// # Errors
///
/// Returns a [`ParseError`] when the record has no header or type, or when
/// a value's delimiters never close.
pub fn extract_record(text: &str, format: Format) -> Result<EntryRecord, ParseError> {
    match format {
        Format::Bibtex => extract_bibtex(text),
        Format::Ris => extract_ris(text),
    }
}

fn extract_bibtex(text: &str) -> Result<EntryRecord, ParseError> {
    let at = text.find('@').ok_or(ParseError::MissingHeader)?;
    let (kind, open) = bibtex_header_at(text, at).ok_or(ParseError::MissingHeader)?;
    let close = matching_brace(text, open).ok_or(ParseError::UnbalancedDelimiter {
        line: line_at(text, at),
    })?;

    let mut record = EntryRecord::new(kind.to_lowercase());
    let body_start = open + 1;
    let body = &text[body_start..close];

    // The key runs up to the first comma, unless the record starts directly
    // with a field assignment.
    let (key, fields_offset) = match body.find(',') {
        Some(comma) if !body[..comma].contains('=') => (body[..comma].trim(), comma + 1),
        None if !body.contains('=') => (body.trim(), body.len()),
        _ => ("", 0),
    };
    if !key.is_empty() {
        record.key = Some(key.to_string());
    }

    let mut scanner = FieldScanner {
        text,
        pos: body_start + fields_offset,
        end: close,
    };
    while let Some((name, value)) = scanner.next_field()? {
        record.set(name.to_lowercase(), vec![value.trim().to_string()]);
    }

    Ok(record)
}

/// Walks the `name = value` pairs of a BibTeX record body.
struct FieldScanner<'a> {
    text: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> FieldScanner<'a> {
    fn next_field(&mut self) -> Result<Option<(&'a str, String)>, ParseError> {
        self.skip_while(|c| c.is_whitespace() || c == ',');
        if self.pos >= self.end {
            return Ok(None);
        }

        let name_start = self.pos;
        self.skip_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'));
        let name = &self.text[name_start..self.pos];
        if name.is_empty() {
            return Err(ParseError::MalformedField(self.snippet(name_start)));
        }

        self.skip_while(char::is_whitespace);
        if !self.rest().starts_with('=') {
            return Err(ParseError::MalformedField(name.to_string()));
        }
        self.pos += 1;
        self.skip_while(char::is_whitespace);

        // Pieces joined with `#` are concatenated as written.
        let mut value = String::new();
        loop {
            let piece = match self.rest().chars().next() {
                Some('{') => self.braced_value()?,
                Some('"') => self.quoted_value()?,
                _ => self.bare_value().trim(),
            };
            value.push_str(piece);

            self.skip_while(char::is_whitespace);
            if !self.rest().starts_with('#') {
                break;
            }
            self.pos += 1;
            self.skip_while(char::is_whitespace);
        }
        Ok(Some((name, value)))
    }

    fn braced_value(&mut self) -> Result<&'a str, ParseError> {
        let open = self.pos;
        let close = matching_brace(&self.text[..self.end], open).ok_or(
            ParseError::UnbalancedDelimiter {
                line: line_at(self.text, open),
            },
        )?;
        self.pos = close + 1;
        Ok(&self.text[open + 1..close])
    }

    fn quoted_value(&mut self) -> Result<&'a str, ParseError> {
        let open = self.pos;
        let mut depth = 0usize;
        for (offset, c) in self.text[open + 1..self.end].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                '"' if depth == 0 => {
                    let close = open + 1 + offset;
                    self.pos = close + 1;
                    return Ok(&self.text[open + 1..close]);
                }
                _ => {}
            }
        }
        Err(ParseError::UnbalancedDelimiter {
            line: line_at(self.text, open),
        })
    }

    fn bare_value(&mut self) -> &'a str {
        let start = self.pos;
        self.skip_while(|c| c != ',' && c != '#');
        &self.text[start..self.pos]
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..self.end]
    }

    fn skip_while(&mut self, predicate: impl Fn(char) -> bool) {
        let rest = self.rest();
        let skipped = rest.find(|c: char| !predicate(c)).unwrap_or(rest.len());
        self.pos += skipped;
    }

    fn snippet(&self, from: usize) -> String {
        self.text[from..self.end].chars().take(20).collect()
    }
}

fn extract_ris(text: &str) -> Result<EntryRecord, ParseError> {
    let mut record = EntryRecord::new(String::new());
    let mut type_seen = false;
    let mut last_tag: Option<String> = None;

    for line in text.lines() {
        let Some((tag, value)) = parse_tag_line(line) else {
            // Untagged lines continue the previous value.
            let continuation = line.trim();
            if let (Some(tag), false) = (&last_tag, continuation.is_empty()) {
                record.append_joined(tag, continuation, " ");
            }
            continue;
        };

        match tag.as_str() {
            RIS_TYPE_TAG => {
                if !type_seen {
                    record.entry_type = value.to_uppercase();
                    type_seen = true;
                }
                last_tag = None;
            }
            RIS_END_TAG => break,
            RIS_ID_TAG => {
                if !value.is_empty() {
                    record.key = Some(value.to_string());
                }
                last_tag = None;
            }
            _ => {
                if !value.is_empty() {
                    record.append_joined(&tag, value, RIS_JOIN);
                }
                last_tag = Some(tag);
            }
        }
    }

    if record.entry_type.is_empty() {
        return Err(ParseError::MissingType);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================
    // BibTeX extraction
    // ============================================

    #[test]
    fn test_extract_bibtex_header_and_fields() {
        // Given: a record with braced, quoted and bare values
        let text = r#"@Article{smith2020,
  Title = {A Title},
  journal = "Journal of Tests",
  year = 2020
}"#;

        // When: we extract it
        let record = extract_record(text, Format::Bibtex).unwrap();

        // Then: type is lower-cased, names are folded, values are raw
        assert_eq!(record.entry_type, "article");
        assert_eq!(record.key.as_deref(), Some("smith2020"));
        assert_eq!(record.first("title"), Some("A Title"));
        assert_eq!(record.first("journal"), Some("Journal of Tests"));
        assert_eq!(record.first("year"), Some("2020"));
        assert_eq!(record.fields.len(), 3);
    }

    #[test]
    fn test_extract_bibtex_keeps_nested_braces() {
        // Given: a value with nested braces
        let text = "@misc{k, title = {outer {inner} text}}";

        // When: we extract it
        let record = extract_record(text, Format::Bibtex).unwrap();

        // Then: inner braces are preserved at this stage
        assert_eq!(record.first("title"), Some("outer {inner} text"));
    }

    #[test]
    fn test_extract_bibtex_quoted_value_with_braces() {
        let text = r#"@misc{k, title = "A {"}quoted{"} word", year = {1999}}"#;

        let record = extract_record(text, Format::Bibtex).unwrap();

        assert_eq!(record.first("title"), Some(r#"A {"}quoted{"} word"#));
        assert_eq!(record.first("year"), Some("1999"));
    }

    #[test]
    fn test_extract_bibtex_preserves_field_order() {
        let text = "@misc{k, zeta = {1}, alpha = {2}, mid = {3}}";

        let record = extract_record(text, Format::Bibtex).unwrap();

        let names: Vec<&str> = record.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_extract_bibtex_repeated_field_replaces_value() {
        let text = "@misc{k, note = {first}, year = {2000}, note = {second}}";

        let record = extract_record(text, Format::Bibtex).unwrap();

        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.first("note"), Some("second"));
    }

    #[test]
    fn test_extract_bibtex_without_key() {
        let text = "@misc{title = {No key here}}";

        let record = extract_record(text, Format::Bibtex).unwrap();

        assert_eq!(record.key, None);
        assert_eq!(record.first("title"), Some("No key here"));
    }

    #[test]
    fn test_extract_bibtex_key_only() {
        let record = extract_record("@misc{lonely}", Format::Bibtex).unwrap();

        assert_eq!(record.key.as_deref(), Some("lonely"));
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_extract_bibtex_concatenated_value() {
        // Given: values assembled from pieces joined with '#'
        let text = "@misc{k,\n  title = {A} # { B},\n  note = \"Vol. \" # {12} # \" of \" # series,\n  year = 2020\n}";

        // When: we extract it
        let record = extract_record(text, Format::Bibtex).unwrap();

        // Then: the pieces are joined in order and later fields still parse
        assert_eq!(record.first("title"), Some("A B"));
        assert_eq!(record.first("note"), Some("Vol. 12 of series"));
        assert_eq!(record.first("year"), Some("2020"));
    }

    #[test]
    fn test_extract_bibtex_missing_header() {
        let result = extract_record("title = {Orphan}", Format::Bibtex);
        assert_eq!(result, Err(ParseError::MissingHeader));

        let result = extract_record("@{k, title = {x}}", Format::Bibtex);
        assert_eq!(result, Err(ParseError::MissingHeader));
    }

    #[test]
    fn test_extract_bibtex_unbalanced_record() {
        let result = extract_record("@misc{k, title = {never closed}", Format::Bibtex);
        assert_eq!(result, Err(ParseError::UnbalancedDelimiter { line: 1 }));
    }

    #[test]
    fn test_extract_bibtex_unterminated_quote() {
        let result = extract_record("@misc{k,\n title = \"open}", Format::Bibtex);
        assert_eq!(result, Err(ParseError::UnbalancedDelimiter { line: 2 }));
    }

    #[test]
    fn test_extract_bibtex_field_without_equals() {
        let result = extract_record("@misc{k, title {x}}", Format::Bibtex);
        assert_eq!(result, Err(ParseError::MalformedField("title".to_string())));
    }

    // ============================================
    // RIS extraction
    // ============================================

    #[test]
    fn test_extract_ris_fields_and_key() {
        // Given: a RIS record with an ID and repeated authors
        let text = "TY  - JOUR\nID  - smith2020\nAU  - Smith, J.\nAU  - Doe, A.\nTI  - A Title\nER  - ";

        // When: we extract it
        let record = extract_record(text, Format::Ris).unwrap();

        // Then: TY and ID are lifted out, repeated tags are joined
        assert_eq!(record.entry_type, "JOUR");
        assert_eq!(record.key.as_deref(), Some("smith2020"));
        assert_eq!(record.values("AU"), ["Smith, J. and Doe, A."]);
        assert_eq!(record.first("TI"), Some("A Title"));
        assert!(!record.contains("ER"));
    }

    #[test]
    fn test_extract_ris_lowercase_tags() {
        let text = "ty  - jour\nti  - Lower\ner  -";

        let record = extract_record(text, Format::Ris).unwrap();

        assert_eq!(record.entry_type, "JOUR");
        assert_eq!(record.first("TI"), Some("Lower"));
    }

    #[test]
    fn test_extract_ris_continuation_lines() {
        let text = "TY  - JOUR\nAB  - First part of the\n   abstract, continued.\nPY  - 2021\nER  -";

        let record = extract_record(text, Format::Ris).unwrap();

        assert_eq!(
            record.first("AB"),
            Some("First part of the abstract, continued.")
        );
        assert_eq!(record.first("PY"), Some("2021"));
    }

    #[test]
    fn test_extract_ris_compact_tag_lines() {
        // Given: tag lines with no space on one side of the dash
        let text = "TY  -JOUR\nAU  -Smith, J.\nTI -A Title\nPY- 2020\nER  - ";

        // When: we extract it
        let record = extract_record(text, Format::Ris).unwrap();

        // Then: every tag is kept
        assert_eq!(record.entry_type, "JOUR");
        assert_eq!(record.first("AU"), Some("Smith, J."));
        assert_eq!(record.first("TI"), Some("A Title"));
        assert_eq!(record.first("PY"), Some("2020"));
    }

    #[test]
    fn test_extract_ris_without_id_has_no_key() {
        let record = extract_record("TY  - BOOK\nTI  - T\nER  -", Format::Ris).unwrap();
        assert_eq!(record.key, None);
    }

    #[test]
    fn test_extract_ris_empty_type_fails() {
        let result = extract_record("TY  - \nTI  - Untyped\nER  -", Format::Ris);
        assert_eq!(result, Err(ParseError::MissingType));
    }
}
