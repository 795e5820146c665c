//! Shared test constants and helpers for integration tests.
#![allow(dead_code)]

/// Two well-formed BibTeX entries exercising every composite field.
pub const SAMPLE_BIBTEX: &str = r#"@article{smith2020,
  author = {Smith, J. and Doe, A.},
  title = {A {Nested} Study of \emph{Things}},
  journal = "Journal of Tests",
  year = 2020,
  volume = {12},
  pages = {123--145},
  keywords = {testing; parsing, rust}
}

@book{knuth1984,
  author = {Knuth, Donald E.},
  title = {The {\TeX}book},
  publisher = {Addison-Wesley},
  address = {Reading, USA},
  year = {1984}
}
"#;

/// Two RIS records, one without an `ID` and with a start page only.
pub const SAMPLE_RIS: &str = "TY  - JOUR
ID  - doe2019
AU  - Doe, Jane
AU  - Roe, Richard
TI  - Measuring things
PY  - 2019
SP  - 10
EP  - 20
KW  - metrology
KW  - units
ER  -

TY  - BOOK
AU  - Lovelace, Ada
TI  - Notes
PY  - 1843
SP  - 7
CY  - London
PP  - UK
ER  -
";

/// A BibTeX file whose second entry never closes.
pub const BIBTEX_WITH_BROKEN_ENTRY: &str = "@article{good,
  title = {Survives},
  year = {2021}
}

@article{broken,
  title = {Never closed,
  year = {2021}
";

/// A minimal equivalence table in the CSV layout the loader expects.
pub const SMALL_TABLE_CSV: &str = "Type,BibTeX Field,RIS Tag
Field,title,T1
Field,year,Y1
Entry Type,@article,JOUR
";

/// Removes trailing whitespace from every line, so `ER  - ` compares equal
/// regardless of how an editor treated the trailing space.
pub fn trim_line_ends(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}
