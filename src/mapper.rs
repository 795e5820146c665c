//! Field mapping between formats.
//!
//! Renames the fields of a normalized record through the equivalence table
//! and gives composite values the shape the destination format expects.

use lazy_static::lazy_static;
use regex::Regex;

use crate::format::{
    Format, BIBTEX_ADDRESS_JOIN, BIBTEX_KEYWORD_JOIN, BIBTEX_NAME_JOIN, BIBTEX_PAGE_RANGE,
    RIS_CITY_TAG, RIS_COUNTRY_TAG, RIS_END_PAGE_TAG, RIS_END_TAG, RIS_ID_TAG, RIS_JOIN,
    RIS_START_PAGE_TAG, RIS_TYPE_TAG,
};
use crate::normalize::{field_role, FieldRole};
use crate::record::{EntryRecord, Field, CITY, COUNTRY, PAGE_END, PAGE_START};
use crate::table::TagLookup;

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"\d{4}").unwrap();
}

/// A record whose type and field names belong to the destination format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRecord {
    /// Destination format
    pub format: Format,
    pub record: EntryRecord,
    /// Source entry type that had no equivalent and was replaced by the
    /// format's default type
    pub unknown_type: Option<String>,
}

/// Maps a normalized record into the `target` format.
///
/// Fields without an equivalence are dropped. When two source fields map to
/// the same destination name the first one is kept.
pub fn map_record(record: &EntryRecord, target: Format, table: &dyn TagLookup) -> MappedRecord {
    let (entry_type, unknown_type) = map_entry_type(&record.entry_type, target, table);

    let mut mapped = EntryRecord::new(entry_type);
    mapped.key = record.key.clone();

    match target {
        Format::Ris => map_fields_to_ris(record, &mut mapped, table),
        Format::Bibtex => map_fields_to_bibtex(record, &mut mapped, table),
    }

    MappedRecord {
        format: target,
        record: mapped,
        unknown_type,
    }
}

fn map_entry_type(
    entry_type: &str,
    target: Format,
    table: &dyn TagLookup,
) -> (String, Option<String>) {
    let mapped = match target {
        Format::Ris => table.lookup_type(entry_type),
        Format::Bibtex => table.type_for_code(entry_type),
    };
    match mapped {
        Some(name) => (name.to_string(), None),
        None => {
            log::debug!(
                "entry type '{}' has no {} equivalent, using '{}'",
                entry_type,
                target,
                target.default_type()
            );
            (
                target.default_type().to_string(),
                Some(entry_type.to_string()),
            )
        }
    }
}

fn map_fields_to_ris(record: &EntryRecord, mapped: &mut EntryRecord, table: &dyn TagLookup) {
    for field in &record.fields {
        match field.name.as_str() {
            PAGE_START => {
                place(mapped, Field::new(RIS_START_PAGE_TAG, field.values.clone()));
                if let Some(end) = record.first(PAGE_END) {
                    if Some(end) != field.first() {
                        place(mapped, Field::single(RIS_END_PAGE_TAG, end));
                    }
                }
            }
            PAGE_END => {}
            CITY => place(mapped, Field::new(RIS_CITY_TAG, field.values.clone())),
            COUNTRY => place(mapped, Field::new(RIS_COUNTRY_TAG, field.values.clone())),
            name => match table.lookup_field(name) {
                Some(RIS_TYPE_TAG | RIS_END_TAG | RIS_ID_TAG) => {
                    log::debug!("field '{}' maps to a reserved RIS tag, dropping it", name)
                }
                Some(tag) => place(mapped, Field::new(tag, field.values.clone())),
                None => log::debug!("no RIS tag for field '{}', dropping it", name),
            },
        }
    }
}

fn map_fields_to_bibtex(record: &EntryRecord, mapped: &mut EntryRecord, table: &dyn TagLookup) {
    for field in &record.fields {
        match field.name.as_str() {
            PAGE_START => match (field.first(), record.first(PAGE_END)) {
                (Some(start), Some(end)) => place(
                    mapped,
                    Field::single("pages", format!("{}{}{}", start, BIBTEX_PAGE_RANGE, end)),
                ),
                _ => log::debug!("single page without an end page, omitting pages"),
            },
            PAGE_END => {}
            CITY | COUNTRY => {
                if mapped.contains("address") {
                    continue;
                }
                let address: Vec<&str> = [record.first(CITY), record.first(COUNTRY)]
                    .into_iter()
                    .flatten()
                    .collect();
                place(mapped, Field::single("address", address.join(BIBTEX_ADDRESS_JOIN)));
            }
            tag => match table.field_for_tag(tag) {
                Some(name) => {
                    let joint = match field_role(tag, Format::Ris, table) {
                        FieldRole::Names => BIBTEX_NAME_JOIN,
                        FieldRole::Keywords => BIBTEX_KEYWORD_JOIN,
                        _ => RIS_JOIN,
                    };
                    place(mapped, Field::single(name, field.values.join(joint)));
                }
                None => log::debug!("no BibTeX field for RIS tag '{}', dropping it", tag),
            },
        }
    }
}

fn place(mapped: &mut EntryRecord, field: Field) {
    let name = field.name.clone();
    if !mapped.insert_new(field) {
        log::debug!("'{}' is already set, keeping the first value", name);
    }
}

/// Builds a citation key from the first author's family name and the year,
/// as in `smith2020`.
///
/// Works on a BibTeX-shaped record. Returns `None` when neither an author
/// nor a year is available.
pub fn generate_key(record: &EntryRecord) -> Option<String> {
    let family = record
        .first("author")
        .and_then(|authors| authors.split(BIBTEX_NAME_JOIN).next())
        .map(family_name)
        .unwrap_or_default();
    let year = record
        .first("year")
        .and_then(|y| YEAR.find(y))
        .map(|m| m.as_str())
        .unwrap_or_default();

    let key = format!("{}{}", family, year);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Lower-cased ASCII letters and digits of a name's family part.
///
/// `Smith, John` and `John Smith` both give `smith`.
fn family_name(name: &str) -> String {
    let family = match name.split_once(',') {
        Some((family, _)) => family,
        None => name.split_whitespace().last().unwrap_or(""),
    };
    family
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
