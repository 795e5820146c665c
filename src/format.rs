//! Citation format discriminator and the lexical constants of each format.

use std::fmt;
use std::path::Path;

use clap::ValueEnum;

/// RIS tag opening a record.
pub const RIS_TYPE_TAG: &str = "TY";
/// RIS tag closing a record.
pub const RIS_END_TAG: &str = "ER";
/// RIS tag carrying the citation key.
pub const RIS_ID_TAG: &str = "ID";
/// RIS tag for the first page.
pub const RIS_START_PAGE_TAG: &str = "SP";
/// RIS tag for the last page.
pub const RIS_END_PAGE_TAG: &str = "EP";
/// RIS tag for the city part of an address.
pub const RIS_CITY_TAG: &str = "CY";
/// RIS tag for the country part of an address.
pub const RIS_COUNTRY_TAG: &str = "PP";

/// Token used to join the values of a repeated RIS tag.
pub const RIS_JOIN: &str = " and ";
/// Token joining author and editor names in a BibTeX value.
pub const BIBTEX_NAME_JOIN: &str = " and ";
/// Token joining keywords in a BibTeX value.
pub const BIBTEX_KEYWORD_JOIN: &str = ", ";
/// Separator between start and end page in a BibTeX `pages` value.
pub const BIBTEX_PAGE_RANGE: &str = "--";
/// Separator between city and country in a BibTeX `address` value.
pub const BIBTEX_ADDRESS_JOIN: &str = ", ";

/// Entry type used when a BibTeX type has no RIS equivalent.
pub const DEFAULT_RIS_TYPE: &str = "GEN";
/// Entry type used when a RIS type code has no BibTeX equivalent.
pub const DEFAULT_BIBTEX_TYPE: &str = "misc";

/// One of the two supported citation formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Format {
    /// Brace-delimited `@type{key, name = {value}}` records
    Bibtex,
    /// Line-tagged `TAG  - value` records
    Ris,
}

impl Format {
    /// Detects the format from a file extension (`.bib` or `.ris`, any case).
    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bib" => Some(Format::Bibtex),
            "ris" => Some(Format::Ris),
            _ => None,
        }
    }

    /// The file extension conventionally used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Bibtex => "bib",
            Format::Ris => "ris",
        }
    }

    /// The format a conversion from `self` produces.
    pub fn counterpart(self) -> Format {
        match self {
            Format::Bibtex => Format::Ris,
            Format::Ris => Format::Bibtex,
        }
    }

    /// Entry type substituted when the equivalence table has no mapping.
    pub fn default_type(self) -> &'static str {
        match self {
            Format::Bibtex => DEFAULT_BIBTEX_TYPE,
            Format::Ris => DEFAULT_RIS_TYPE,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Bibtex => write!(f, "BibTeX"),
            Format::Ris => write!(f, "RIS"),
        }
    }
}
