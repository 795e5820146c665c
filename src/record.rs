//! The intermediate representation shared by every conversion stage.

/// Sub-key holding the first page once `pages` has been decomposed.
pub const PAGE_START: &str = "page_start";
/// Sub-key holding the last page; only present when it differs from the first.
pub const PAGE_END: &str = "page_end";
/// Sub-key holding the city part of an address.
pub const CITY: &str = "city";
/// Sub-key holding the country part of an address.
pub const COUNTRY: &str = "country";

/// A named field with one or more ordered values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub values: Vec<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, vec![value.into()])
    }

    /// First value, which is the only one for scalar fields.
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// One bibliographic record as it travels through a conversion.
///
/// Fields keep their insertion order so that output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// BibTeX type name (`article`) or RIS type code (`JOUR`)
    pub entry_type: String,
    /// Citation key, if the source carried one
    pub key: Option<String>,
    pub fields: Vec<Field>,
}

impl EntryRecord {
    pub fn new(entry_type: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            key: None,
            fields: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// First value of the named field.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Field::first)
    }

    /// All values of the named field, empty when the field is absent.
    pub fn values(&self, name: &str) -> &[String] {
        self.get(name).map(|f| f.values.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets a field to the given values, replacing an earlier field of the
    /// same name in place.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.values = values,
            None => self.fields.push(Field::new(name, values)),
        }
    }

    /// Appends `value` to the last value of the named field using `token`,
    /// or creates the field.
    pub fn append_joined(&mut self, name: &str, value: &str, token: &str) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => match field.values.last_mut() {
                Some(last) => {
                    last.push_str(token);
                    last.push_str(value);
                }
                None => field.values.push(value.to_string()),
            },
            None => self.fields.push(Field::single(name, value)),
        }
    }

    /// Adds a field unless one with the same name already exists.
    ///
    /// Returns `false` when the field was not added.
    pub fn insert_new(&mut self, field: Field) -> bool {
        if self.contains(&field.name) {
            return false;
        }
        self.fields.push(field);
        true
    }
}
