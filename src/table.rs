//! Tag equivalence table.
//!
//! Maps BibTeX field names and entry types to RIS tags and type codes, in
//! both directions. Tables are loaded from a CSV file with the header
//! `Type,BibTeX Field,RIS Tag`, or taken from the builtin defaults.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading an equivalence table.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Table contains no field or entry type equivalences")]
    Empty,
}

/// Read-only lookups the conversion engine needs from an equivalence table.
pub trait TagLookup {
    /// RIS tag for a BibTeX field name.
    fn lookup_field(&self, name: &str) -> Option<&str>;
    /// RIS type code for a BibTeX entry type.
    fn lookup_type(&self, name: &str) -> Option<&str>;
    /// BibTeX field name for a RIS tag.
    fn field_for_tag(&self, tag: &str) -> Option<&str>;
    /// BibTeX entry type for a RIS type code.
    fn type_for_code(&self, code: &str) -> Option<&str>;
}

/// One row of the table: a BibTeX name and its RIS counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Equivalence {
    pub bibtex: String,
    pub ris: String,
}

/// Bidirectional field and entry-type equivalences.
///
/// Forward lookups honour the last row for a name; inverse lookups honour
/// the first row for a tag.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TagTable {
    fields: Vec<Equivalence>,
    types: Vec<Equivalence>,
    #[serde(skip)]
    field_to_tag: HashMap<String, String>,
    #[serde(skip)]
    tag_to_field: HashMap<String, String>,
    #[serde(skip)]
    type_to_code: HashMap<String, String>,
    #[serde(skip)]
    code_to_type: HashMap<String, String>,
}

/// A CSV row as written in `tag_equivalence.csv`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "BibTeX Field")]
    bibtex: String,
    #[serde(rename = "RIS Tag")]
    ris: String,
}

/// Field equivalences compiled into the binary.
const BUILTIN_FIELDS: &[(&str, &str)] = &[
    ("author", "AU"),
    ("editor", "ED"),
    ("title", "TI"),
    ("journal", "JO"),
    ("booktitle", "BT"),
    ("year", "PY"),
    ("volume", "VL"),
    ("number", "IS"),
    ("pages", "SP"),
    ("publisher", "PB"),
    ("address", "CY"),
    ("edition", "ET"),
    ("series", "T3"),
    ("doi", "DO"),
    ("url", "UR"),
    ("issn", "SN"),
    ("isbn", "SN"),
    ("abstract", "AB"),
    ("keywords", "KW"),
    ("note", "N1"),
    ("language", "LA"),
];

/// Entry type equivalences compiled into the binary.
const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("article", "JOUR"),
    ("book", "BOOK"),
    ("inproceedings", "CONF"),
    ("conference", "CONF"),
    ("proceedings", "CONF"),
    ("incollection", "CHAP"),
    ("inbook", "CHAP"),
    ("phdthesis", "THES"),
    ("mastersthesis", "THES"),
    ("techreport", "RPRT"),
    ("unpublished", "UNPB"),
    ("booklet", "PAMP"),
    ("online", "ELEC"),
    ("misc", "GEN"),
    ("manual", "GEN"),
];

impl TagTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin equivalences, used when no CSV table is supplied.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (name, tag) in BUILTIN_FIELDS {
            table.insert_field(name, tag);
        }
        for (name, code) in BUILTIN_TYPES {
            table.insert_type(name, code);
        }
        table
    }

    /// Loads a table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid CSV with the
    /// expected header, or defines no equivalences.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads a table from CSV content.
    ///
    /// Rows whose `Type` is neither `Field` nor `Entry Type` are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = Self::new();
        for row in csv_reader.deserialize::<CsvRow>() {
            let row = row?;
            if row.bibtex.is_empty() || row.ris.is_empty() {
                continue;
            }
            match row.kind.as_str() {
                "Field" => table.insert_field(&row.bibtex, &row.ris),
                "Entry Type" => table.insert_type(&row.bibtex, &row.ris),
                other => log::debug!("ignoring equivalence row of type '{}'", other),
            }
        }

        if table.is_empty() {
            return Err(TableError::Empty);
        }
        Ok(table)
    }

    /// Registers a field equivalence.
    pub fn insert_field(&mut self, name: &str, tag: &str) {
        let name = name.trim().to_lowercase();
        let tag = tag.trim().to_uppercase();
        self.field_to_tag.insert(name.clone(), tag.clone());
        self.tag_to_field
            .entry(tag.clone())
            .or_insert_with(|| name.clone());
        self.fields.push(Equivalence { bibtex: name, ris: tag });
    }

    /// Registers an entry type equivalence. A leading `@` on the name is
    /// ignored.
    pub fn insert_type(&mut self, name: &str, code: &str) {
        let name = name.trim().trim_start_matches('@').to_lowercase();
        let code = code.trim().to_uppercase();
        self.type_to_code.insert(name.clone(), code.clone());
        self.code_to_type
            .entry(code.clone())
            .or_insert_with(|| name.clone());
        self.types.push(Equivalence { bibtex: name, ris: code });
    }

    /// Field equivalences in the order they were registered.
    pub fn fields(&self) -> &[Equivalence] {
        &self.fields
    }

    /// Entry type equivalences in the order they were registered.
    pub fn types(&self) -> &[Equivalence] {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.types.is_empty()
    }
}

impl TagLookup for TagTable {
    fn lookup_field(&self, name: &str) -> Option<&str> {
        self.field_to_tag
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    fn lookup_type(&self, name: &str) -> Option<&str> {
        self.type_to_code
            .get(&name.trim_start_matches('@').to_lowercase())
            .map(String::as_str)
    }

    fn field_for_tag(&self, tag: &str) -> Option<&str> {
        self.tag_to_field
            .get(&tag.to_uppercase())
            .map(String::as_str)
    }

    fn type_for_code(&self, code: &str) -> Option<&str> {
        self.code_to_type
            .get(&code.to_uppercase())
            .map(String::as_str)
    }
}
