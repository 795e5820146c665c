//! Value normalization.
//!
//! Cleans raw field values (whitespace, LaTeX markup, braces) and gives
//! multi-valued and composite fields their semantic shape: author lists,
//! keyword lists, page ranges and city/country pairs.

use lazy_static::lazy_static;
use regex::Regex;

use crate::format::{
    Format, RIS_CITY_TAG, RIS_COUNTRY_TAG, RIS_END_PAGE_TAG, RIS_START_PAGE_TAG,
};
use crate::record::{EntryRecord, CITY, COUNTRY, PAGE_END, PAGE_START};
use crate::table::TagLookup;

lazy_static! {
    static ref BRACED_ACCENT: Regex = Regex::new(r#"\\(['"^`~=.])\{(\w)\}"#).unwrap();
    static ref LEFTOVER_ACCENT: Regex = Regex::new(r#"\\['"^`~=.]"#).unwrap();
    static ref COMMAND_WITH_ARG: Regex = Regex::new(r"\\[a-zA-Z]+\{([^{}]*)\}").unwrap();
    static ref ESCAPED_CHAR: Regex = Regex::new(r"\\([&%$#_])").unwrap();
    static ref BARE_COMMAND: Regex = Regex::new(r"\\[a-zA-Z]+").unwrap();
    static ref AND_SEPARATOR: Regex = Regex::new(r"(?i)\s+and\s+").unwrap();
    static ref PAGE_RANGE: Regex = Regex::new(r"(\d+)\s*[-‐‑–—]+\s*(\d+)").unwrap();
    static ref INTEGER: Regex = Regex::new(r"\d+").unwrap();
}

/// Accented letters written with LaTeX accent commands.
const ACCENTS: &[(&str, &str)] = &[
    ("\\\"a", "ä"), ("\\\"o", "ö"), ("\\\"u", "ü"), ("\\\"e", "ë"), ("\\\"i", "ï"),
    ("\\\"A", "Ä"), ("\\\"O", "Ö"), ("\\\"U", "Ü"),
    ("\\'a", "á"), ("\\'e", "é"), ("\\'i", "í"), ("\\'o", "ó"), ("\\'u", "ú"),
    ("\\'E", "É"), ("\\'c", "ć"), ("\\'n", "ń"), ("\\'s", "ś"), ("\\'z", "ź"),
    ("\\`a", "à"), ("\\`e", "è"), ("\\`i", "ì"), ("\\`o", "ò"), ("\\`u", "ù"),
    ("\\^a", "â"), ("\\^e", "ê"), ("\\^i", "î"), ("\\^o", "ô"), ("\\^u", "û"),
    ("\\~n", "ñ"), ("\\~a", "ã"), ("\\~o", "õ"), ("\\~N", "Ñ"),
    ("\\c{c}", "ç"), ("\\c{C}", "Ç"),
    ("{\\ss}", "ß"), ("{\\o}", "ø"), ("{\\O}", "Ø"), ("{\\aa}", "å"), ("{\\AA}", "Å"),
];

/// How a field is shaped during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Author or editor list joined with `and`
    Names,
    /// Keyword list joined with commas, semicolons or `and`
    Keywords,
    /// A BibTeX page range
    Pages,
    /// RIS start page
    StartPage,
    /// RIS end page
    EndPage,
    /// A BibTeX `city, country` address
    Address,
    /// RIS city
    City,
    /// RIS country
    Country,
    /// Any other scalar field
    Text,
}

/// A page range; `start == end` for a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRange {
    pub start: String,
    pub end: String,
}

/// An address decomposed into at most two parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Determines the role of a field name (BibTeX) or tag (RIS).
///
/// RIS tags are resolved to BibTeX names through the table's inverse lookup,
/// so `AU` is a name list whenever the table maps it to `author`.
pub fn field_role(name: &str, format: Format, table: &dyn TagLookup) -> FieldRole {
    match format {
        Format::Bibtex => bibtex_role(name),
        Format::Ris => match name {
            RIS_START_PAGE_TAG => FieldRole::StartPage,
            RIS_END_PAGE_TAG => FieldRole::EndPage,
            RIS_CITY_TAG => FieldRole::City,
            RIS_COUNTRY_TAG => FieldRole::Country,
            tag => match table.field_for_tag(tag).map(bibtex_role) {
                Some(FieldRole::Names) => FieldRole::Names,
                Some(FieldRole::Keywords) => FieldRole::Keywords,
                _ => FieldRole::Text,
            },
        },
    }
}

fn bibtex_role(name: &str) -> FieldRole {
    match name {
        "author" | "editor" => FieldRole::Names,
        "keywords" => FieldRole::Keywords,
        "pages" => FieldRole::Pages,
        "address" => FieldRole::Address,
        _ => FieldRole::Text,
    }
}

/// Normalizes every field of a record.
///
/// Empty values are dropped, multi-valued fields become lists, pages become
/// [`PAGE_START`]/[`PAGE_END`] and addresses become [`CITY`]/[`COUNTRY`].
/// Field order follows the source; a decomposed field takes the position of
/// the first source field that contributed to it.
pub fn normalize_record(record: EntryRecord, format: Format, table: &dyn TagLookup) -> EntryRecord {
    let pages = record_pages(&record, format, table);
    let mut pages_placed = false;

    let mut out = EntryRecord::new(record.entry_type.trim());
    out.key = record
        .key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());

    for field in record.fields {
        let role = field_role(&field.name, format, table);
        let cleaned: Vec<String> = field
            .values
            .iter()
            .map(|v| clean_value(v, format))
            .filter(|v| !v.is_empty())
            .collect();

        match role {
            FieldRole::Pages | FieldRole::StartPage | FieldRole::EndPage => {
                if pages_placed {
                    continue;
                }
                pages_placed = true;
                if let Some(range) = &pages {
                    out.set(PAGE_START, vec![range.start.clone()]);
                    if range.end != range.start {
                        out.set(PAGE_END, vec![range.end.clone()]);
                    }
                }
            }
            FieldRole::Names => {
                set_list(&mut out, field.name, cleaned.iter().flat_map(|v| split_names(v)).collect())
            }
            FieldRole::Keywords => {
                set_list(&mut out, field.name, cleaned.iter().flat_map(|v| split_keywords(v)).collect())
            }
            FieldRole::Address => {
                let address = split_address(&cleaned.join(", "));
                if let Some(city) = address.city {
                    out.set(CITY, vec![city]);
                }
                if let Some(country) = address.country {
                    out.set(COUNTRY, vec![country]);
                }
            }
            FieldRole::City => set_list(&mut out, CITY.to_string(), cleaned),
            FieldRole::Country => set_list(&mut out, COUNTRY.to_string(), cleaned),
            FieldRole::Text => set_list(&mut out, field.name, cleaned),
        }
    }

    out
}

fn set_list(record: &mut EntryRecord, name: String, values: Vec<String>) {
    if !values.is_empty() {
        record.set(name, values);
    }
}

/// Works out the page range of a record before its fields are rewritten.
fn record_pages(record: &EntryRecord, format: Format, table: &dyn TagLookup) -> Option<PageRange> {
    let value_with_role = |role: FieldRole| {
        record
            .fields
            .iter()
            .find(|f| field_role(&f.name, format, table) == role)
            .and_then(|f| f.first())
            .map(|v| clean_value(v, format))
    };

    match format {
        Format::Bibtex => parse_pages(&value_with_role(FieldRole::Pages)?),
        Format::Ris => {
            let mut range = parse_pages(&value_with_role(FieldRole::StartPage)?)?;
            if let Some(end) = value_with_role(FieldRole::EndPage)
                .as_deref()
                .and_then(|v| INTEGER.find(v))
            {
                range.end = end.as_str().to_string();
            }
            Some(range)
        }
    }
}

/// Cleans a single raw value.
///
/// Whitespace is collapsed, BibTeX markup is stripped and literal braces are
/// removed.
pub fn clean_value(raw: &str, format: Format) -> String {
    let mut value = collapse_whitespace(raw);
    if format == Format::Bibtex {
        value = strip_markup(&value);
    }
    value.retain(|c| c != '{' && c != '}');
    collapse_whitespace(&value)
}

/// Collapses whitespace runs, newlines included, to single spaces and trims.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips LaTeX markup from a BibTeX value.
///
/// `\command{text}` becomes `text` (innermost first), accents are decoded,
/// escaped specials (`\&`, `\%`, ...) lose their backslash, and remaining
/// bare `\command` tokens are removed. Braces are left for the caller.
pub fn strip_markup(value: &str) -> String {
    let mut result = BRACED_ACCENT.replace_all(value, "\\$1$2").into_owned();
    for (pattern, replacement) in ACCENTS {
        result = result.replace(pattern, replacement);
    }
    result = LEFTOVER_ACCENT.replace_all(&result, "").into_owned();

    loop {
        let replaced = COMMAND_WITH_ARG.replace_all(&result, "$1").into_owned();
        if replaced == result {
            break;
        }
        result = replaced;
    }

    result = ESCAPED_CHAR.replace_all(&result, "$1").into_owned();
    BARE_COMMAND.replace_all(&result, "").into_owned()
}

/// Splits an author or editor list on the word `and` (any case).
pub fn split_names(value: &str) -> Vec<String> {
    AND_SEPARATOR
        .split(value)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

/// Splits a keyword list on commas and semicolons, treating `and` as a comma.
pub fn split_keywords(value: &str) -> Vec<String> {
    AND_SEPARATOR
        .replace_all(value, ",")
        .split([',', ';'])
        .map(str::trim)
        .filter(|kw| !kw.is_empty())
        .map(String::from)
        .collect()
}

/// Finds a page range in a value.
///
/// `123--145`, `123-145` and en/em dash variants give a range; otherwise the
/// first integer is both start and end. Returns `None` when the value holds
/// no integer.
pub fn parse_pages(value: &str) -> Option<PageRange> {
    if let Some(caps) = PAGE_RANGE.captures(value) {
        return Some(PageRange {
            start: caps[1].to_string(),
            end: caps[2].to_string(),
        });
    }
    INTEGER.find(value).map(|m| PageRange {
        start: m.as_str().to_string(),
        end: m.as_str().to_string(),
    })
}

/// Splits an address on the first comma, slash or semicolon into city and
/// country.
pub fn split_address(value: &str) -> Address {
    let mut parts = value
        .splitn(2, [',', '/', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty());
    Address {
        city: parts.next().map(String::from),
        country: parts.next().map(String::from),
    }
}
