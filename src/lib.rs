//! bibconv: convert bibliographies between BibTeX and RIS.
//!
//! This library provides functionality to:
//! - Split a bibliography into records and extract their fields
//! - Normalize values (markup, author lists, page ranges, addresses)
//! - Map fields and entry types through a tag equivalence table
//! - Render records in the destination format
//!
//! Malformed records are skipped and reported; a pass only fails when no
//! record converts.

pub mod convert;
pub mod extract;
pub mod format;
pub mod mapper;
pub mod normalize;
pub mod record;
pub mod serialize;
pub mod split;
pub mod table;

pub use convert::{convert, convert_record, Conversion, ConvertError, RecordIssue};
pub use extract::{extract_record, ParseError};
pub use format::Format;
pub use mapper::{generate_key, map_record, MappedRecord};
pub use normalize::{normalize_record, parse_pages, split_address, split_names, PageRange};
pub use record::{EntryRecord, Field};
pub use serialize::{join_records, render_record};
pub use split::split_records;
pub use table::{Equivalence, TableError, TagLookup, TagTable};
