//! Rendering mapped records as BibTeX or RIS text.

use crate::format::{Format, RIS_END_TAG, RIS_ID_TAG, RIS_TYPE_TAG};
use crate::mapper::MappedRecord;

/// Renders one record in its destination format.
///
/// The result always ends with a newline.
pub fn render_record(mapped: &MappedRecord) -> String {
    match mapped.format {
        Format::Ris => render_ris(mapped),
        Format::Bibtex => render_bibtex(mapped),
    }
}

/// Joins rendered records with one blank line between them.
pub fn join_records<S: AsRef<str>>(records: &[S]) -> String {
    records
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_ris(mapped: &MappedRecord) -> String {
    let record = &mapped.record;
    let mut out = String::new();
    push_tag_line(&mut out, RIS_TYPE_TAG, &record.entry_type);
    if let Some(key) = &record.key {
        push_tag_line(&mut out, RIS_ID_TAG, key);
    }
    for field in &record.fields {
        for value in &field.values {
            push_tag_line(&mut out, &field.name, value);
        }
    }
    push_tag_line(&mut out, RIS_END_TAG, "");
    out
}

fn push_tag_line(out: &mut String, tag: &str, value: &str) {
    out.push_str(&format!("{:<2}  - {}\n", tag.to_uppercase(), value));
}

fn render_bibtex(mapped: &MappedRecord) -> String {
    let record = &mapped.record;
    let key = record.key.as_deref().unwrap_or("");
    if record.fields.is_empty() {
        return format!("@{}{{{}\n}}\n", record.entry_type, key);
    }

    let body = record
        .fields
        .iter()
        .map(|field| format!("  {} = {{{}}}", field.name, field.values.join(" ")))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("@{}{{{},\n{}\n}}\n", record.entry_type, key, body)
}
