//! Conversion driver.
//!
//! Runs every record of a source text through splitting, extraction,
//! normalization, mapping and rendering. A record that fails is reported
//! and skipped; the pass only fails when no record converts.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::extract::{extract_record, ParseError};
use crate::format::Format;
use crate::mapper::{generate_key, map_record, MappedRecord};
use crate::normalize::normalize_record;
use crate::serialize::{join_records, render_record};
use crate::split::split_records;
use crate::table::TagLookup;

/// Errors raised while converting a bibliography.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("entry type '{entry_type}' has no equivalent, written as '{fallback}'")]
    UnknownTypeMapping { entry_type: String, fallback: String },

    #[error("no valid entries found ({failed} record(s) failed to parse)")]
    NoEntriesFound { failed: usize },
}

/// A problem with one record. `index` is 1-based in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIssue {
    pub index: usize,
    pub error: ConvertError,
}

impl RecordIssue {
    /// Whether the record was dropped from the output.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.error, ConvertError::UnknownTypeMapping { .. })
    }
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {}: {}", self.index, self.error)
    }
}

/// The outcome of a conversion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Destination text
    pub output: String,
    /// Number of records written to `output`
    pub converted: usize,
    /// Skipped records and recovered problems, in source order
    pub issues: Vec<RecordIssue>,
}

impl Conversion {
    /// Number of records that could not be converted.
    pub fn skipped(&self) -> usize {
        self.issues.iter().filter(|issue| issue.is_fatal()).count()
    }
}

/// Converts a whole bibliography from `from` into its counterpart format.
///
/// # Errors
///
/// Returns [`ConvertError::NoEntriesFound`] when the text holds no record
/// that converts. Failures of individual records are reported in
/// [`Conversion::issues`] instead.
pub fn convert(text: &str, from: Format, table: &dyn TagLookup) -> Result<Conversion, ConvertError> {
    let target = from.counterpart();
    let mut mapped_records = Vec::new();
    let mut issues = Vec::new();

    for (position, chunk) in split_records(text, from).enumerate() {
        let index = position + 1;
        let result = chunk.and_then(|record_text| convert_record(record_text, from, table));
        let mut mapped = match result {
            Ok(mapped) => mapped,
            Err(e) => {
                log::warn!("skipping record {}: {}", index, e);
                issues.push(RecordIssue {
                    index,
                    error: e.into(),
                });
                continue;
            }
        };

        if let Some(entry_type) = mapped.unknown_type.take() {
            let fallback = mapped.record.entry_type.clone();
            log::warn!(
                "record {}: entry type '{}' has no {} equivalent, using '{}'",
                index,
                entry_type,
                target,
                fallback
            );
            issues.push(RecordIssue {
                index,
                error: ConvertError::UnknownTypeMapping {
                    entry_type,
                    fallback,
                },
            });
        }

        mapped_records.push((index, mapped));
    }

    // Source keys are reserved before any key is generated.
    let mut used_keys: HashSet<String> = mapped_records
        .iter()
        .filter_map(|(_, mapped)| mapped.record.key.clone())
        .collect();
    let rendered: Vec<String> = mapped_records
        .iter_mut()
        .map(|(index, mapped)| {
            assign_key(mapped, *index, &mut used_keys);
            render_record(mapped)
        })
        .collect();

    let converted = rendered.len();
    let failed = issues.iter().filter(|issue| issue.is_fatal()).count();
    if converted == 0 {
        return Err(ConvertError::NoEntriesFound { failed });
    }

    log::info!(
        "converted {} {} record(s) to {}, skipped {}",
        converted,
        from,
        target,
        failed
    );

    Ok(Conversion {
        output: join_records(&rendered),
        converted,
        issues,
    })
}

/// Extracts, normalizes and maps the text of a single record.
pub fn convert_record(
    text: &str,
    from: Format,
    table: &dyn TagLookup,
) -> Result<MappedRecord, ParseError> {
    let record = extract_record(text, from)?;
    let record = normalize_record(record, from, table);
    Ok(map_record(&record, from.counterpart(), table))
}

/// Gives a BibTeX record without a key a generated one that no other
/// record of the pass uses.
fn assign_key(mapped: &mut MappedRecord, index: usize, used: &mut HashSet<String>) {
    if mapped.record.key.is_some() || mapped.format != Format::Bibtex {
        return;
    }
    let base = generate_key(&mapped.record).unwrap_or_else(|| format!("entry{}", index));
    let key = unique_key(&base, used);
    used.insert(key.clone());
    mapped.record.key = Some(key);
}

fn unique_key(base: &str, used: &HashSet<String>) -> String {
    if !used.contains(base) {
        return base.to_string();
    }
    ('a'..='z')
        .map(|suffix| format!("{}{}", base, suffix))
        .chain((2..).map(|n| format!("{}_{}", base, n)))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TagTable;

    // ============================================
    // BibTeX to RIS
    // ============================================

    #[test]
    fn test_convert_bibtex_to_ris() {
        // Given: a single BibTeX article
        let input = "@article{smith2020,\n  title = {A Title},\n  author = {Smith, J. and Doe, A.},\n  pages = {123--145},\n  year = 2020\n}\n";

        // When: we convert it
        let result = convert(input, Format::Bibtex, &TagTable::builtin()).unwrap();

        // Then: one RIS record comes out
        assert_eq!(result.converted, 1);
        assert!(result.issues.is_empty());
        assert_eq!(
            result.output,
            "TY  - JOUR\n\
             ID  - smith2020\n\
             TI  - A Title\n\
             AU  - Smith, J.\n\
             AU  - Doe, A.\n\
             SP  - 123\n\
             EP  - 145\n\
             PY  - 2020\n\
             ER  - \n"
        );
    }

    #[test]
    fn test_bad_record_is_isolated() {
        // Given: a good record followed by one missing its closing brace
        let input = "@article{good, title = {Fine}}\n\n@book{bad, title = {Broken}\n";

        // When: we convert
        let result = convert(input, Format::Bibtex, &TagTable::builtin()).unwrap();

        // Then: the good record converts and the bad one is reported
        assert_eq!(result.converted, 1);
        assert_eq!(result.skipped(), 1);
        assert_eq!(result.issues[0].index, 2);
        assert!(matches!(
            result.issues[0].error,
            ConvertError::Parse(ParseError::UnbalancedDelimiter { .. })
        ));
        assert!(result.output.contains("TI  - Fine"));
        assert!(!result.output.contains("Broken"));
    }

    #[test]
    fn test_unknown_type_is_recovered() {
        let input = "@patent{p1, title = {Widget}}";

        let result = convert(input, Format::Bibtex, &TagTable::builtin()).unwrap();

        assert_eq!(result.converted, 1);
        assert_eq!(result.skipped(), 0);
        assert!(result.output.starts_with("TY  - GEN\n"));
        assert_eq!(
            result.issues,
            vec![RecordIssue {
                index: 1,
                error: ConvertError::UnknownTypeMapping {
                    entry_type: "patent".to_string(),
                    fallback: "GEN".to_string(),
                },
            }]
        );
    }

    #[test]
    fn test_no_entries_is_an_error() {
        let table = TagTable::builtin();

        assert_eq!(
            convert("", Format::Bibtex, &table),
            Err(ConvertError::NoEntriesFound { failed: 0 })
        );
        assert_eq!(
            convert("@article{x, title = {open\n", Format::Bibtex, &table),
            Err(ConvertError::NoEntriesFound { failed: 1 })
        );
    }

    // ============================================
    // RIS to BibTeX
    // ============================================

    #[test]
    fn test_convert_ris_to_bibtex_generates_keys() {
        // Given: two RIS records by the same author and year without IDs
        let input = "TY  - JOUR\nAU  - Smith, John\nPY  - 2020\nTI  - One\nER  - \n\n\
                     TY  - JOUR\nAU  - Smith, Jane\nPY  - 2020\nTI  - Two\nER  - \n";

        // When: we convert them
        let result = convert(input, Format::Ris, &TagTable::builtin()).unwrap();

        // Then: keys are derived and kept unique
        assert_eq!(result.converted, 2);
        assert!(result.output.contains("@article{smith2020,\n"));
        assert!(result.output.contains("@article{smith2020a,\n"));
    }

    #[test]
    fn test_ris_record_without_author_or_year_gets_index_key() {
        let input = "TY  - GEN\nTI  - Untitled\nER  - \n";

        let result = convert(input, Format::Ris, &TagTable::builtin()).unwrap();

        assert_eq!(result.output, "@misc{entry1,\n  title = {Untitled}\n}\n");
    }

    #[test]
    fn test_generated_key_avoids_later_source_key() {
        // Given: a record without ID whose generated key matches a later ID
        let input = "TY  - JOUR\nAU  - Smith, John\nPY  - 2020\nTI  - One\nER  - \n\
                     TY  - JOUR\nID  - smith2020\nTI  - Two\nER  - \n";

        // When: we convert them
        let result = convert(input, Format::Ris, &TagTable::builtin()).unwrap();

        // Then: the source key is kept and the generated one is suffixed
        assert_eq!(result.output.matches("@article{smith2020,\n").count(), 1);
        assert!(result.output.starts_with("@article{smith2020a,\n"));
        assert!(result.output.contains("@article{smith2020,\n  title = {Two}"));
    }

    #[test]
    fn test_compact_ris_tags_keep_their_values() {
        // Given: tag lines without a space on one side of the dash
        let input = "TY  - JOUR\nAU  -Smith, J.\nTI -A Title\nPY- 2020\nER  - \n";

        // When: we convert
        let result = convert(input, Format::Ris, &TagTable::builtin()).unwrap();

        // Then: author, title and year survive
        assert_eq!(
            result.output,
            "@article{smith2020,\n  author = {Smith, J.},\n  title = {A Title},\n  year = {2020}\n}\n"
        );
    }

    #[test]
    fn test_byte_order_mark_does_not_drop_first_record() {
        let input = "\u{feff}TY  - JOUR\nTI  - First\nER  - \n\nTY  - BOOK\nTI  - Second\nER  - \n";

        let result = convert(input, Format::Ris, &TagTable::builtin()).unwrap();

        assert_eq!(result.converted, 2);
        assert!(result.issues.is_empty());
        assert!(result.output.starts_with("@article{entry1,\n  title = {First}\n}\n"));
    }

    #[test]
    fn test_ris_id_is_kept_as_key() {
        let input = "TY  - BOOK\nID  - knuth84\nTI  - The TeXbook\nER  - \n";

        let result = convert(input, Format::Ris, &TagTable::builtin()).unwrap();

        assert!(result.output.starts_with("@book{knuth84,\n"));
    }

    #[test]
    fn test_unique_key_suffixes() {
        let mut used = HashSet::new();
        assert_eq!(unique_key("doe2019", &used), "doe2019");
        used.insert("doe2019".to_string());
        assert_eq!(unique_key("doe2019", &used), "doe2019a");
        used.insert("doe2019a".to_string());
        assert_eq!(unique_key("doe2019", &used), "doe2019b");
    }

    #[test]
    fn test_record_issue_display() {
        let issue = RecordIssue {
            index: 3,
            error: ParseError::MissingType.into(),
        };
        assert_eq!(issue.to_string(), "record 3: record has no entry type");
    }
}
