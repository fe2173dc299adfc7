//! BibTeX entry data structures

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// How a field participates in resolution.
///
/// Field names drive branching logic (author splitting, crossref lookup);
/// the kind is computed once when the field is created instead of re-testing
/// the name string at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Author,
    Crossref,
    Generic,
}

impl FieldKind {
    /// Classify a (lowercased) field name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "author" => Self::Author,
            "crossref" => Self::Crossref,
            _ => Self::Generic,
        }
    }
}

/// One segment of a `#`-concatenated field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSegment {
    /// A braced or quoted literal, delimiters stripped.
    Literal(String),
    /// A bare token presumed to name a string variable.
    Variable(String),
}

/// A field value as written in the source, before substitution.
///
/// The `#` operator structure is preserved so the serializer can re-emit
/// concatenation syntax when a field references a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawValue {
    /// A single braced or quoted literal.
    Literal(String),
    /// A single bare token referencing a string variable.
    Variable(String),
    /// A `#`-joined concatenation list.
    Concat(Vec<ValueSegment>),
}

impl RawValue {
    /// True if any part of the value references a string variable.
    pub fn references_variable(&self) -> bool {
        match self {
            RawValue::Literal(_) => false,
            RawValue::Variable(_) => true,
            RawValue::Concat(segments) => segments
                .iter()
                .any(|s| matches!(s, ValueSegment::Variable(_))),
        }
    }
}

/// A single BibTeX field (name, kind, raw value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibTeXField {
    pub name: String,
    pub kind: FieldKind,
    pub value: RawValue,
    /// True when the field was copied from a crossref target. Inherited
    /// fields are stripped and recomputed on each resolve, and never act as
    /// inheritance sources themselves (crossref is single-level).
    pub inherited: bool,
}

impl BibTeXField {
    /// Create a field, lowercasing the name and classifying its kind.
    pub fn new(name: &str, value: RawValue) -> Self {
        let name = name.to_lowercase();
        let kind = FieldKind::from_name(&name);
        Self {
            name,
            kind,
            value,
            inherited: false,
        }
    }
}

/// A `@string{key = value}` macro definition.
///
/// Also the exchange type for editor-supplied variable edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringVariable {
    pub key: String,
    pub value: String,
}

impl StringVariable {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_lowercase(),
            value: value.into(),
        }
    }
}

/// A parsed author name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorName {
    /// A variable reference, or a brace-protected name kept verbatim
    /// (corporate names that must not be split into first/last).
    Literal(String),
    /// A personal name, stored and rendered as "Last, First".
    Normalized { last: String, first: String },
}

impl AuthorName {
    /// Display form: "Last, First" for normalized names, the verbatim text
    /// for literals.
    pub fn display(&self) -> String {
        match self {
            AuthorName::Literal(text) => text.clone(),
            AuthorName::Normalized { last, first } => {
                if first.is_empty() {
                    last.clone()
                } else {
                    format!("{}, {}", last, first)
                }
            }
        }
    }
}

/// A parsed BibTeX entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibTeXEntry {
    /// Entry type, lowercased (`article`, `book`, ...). Unknown types are
    /// kept as written so they round-trip.
    pub entry_type: String,
    /// Citation key, original case preserved.
    pub cite_key: String,
    /// Fields in source order. Names are unique; a repeated name in the
    /// source keeps the first position with the last value.
    pub fields: Vec<BibTeXField>,
    /// Field values after variable substitution; filled by the resolver.
    pub resolved_fields: HashMap<String, String>,
    /// Parsed author list; filled by the resolver.
    pub authors: Vec<AuthorName>,
}

impl BibTeXEntry {
    /// Create a new entry with no fields.
    pub fn new(entry_type: &str, cite_key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.to_lowercase(),
            cite_key: cite_key.into(),
            fields: Vec::new(),
            resolved_fields: HashMap::new(),
            authors: Vec::new(),
        }
    }

    /// Insert or replace a field. A field with the same name keeps its
    /// position; otherwise the field is appended.
    pub fn set_field(&mut self, name: &str, value: RawValue) {
        let field = BibTeXField::new(name, value);
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            existing.value = field.value;
            // An explicit edit overrides any crossref-inherited value.
            existing.inherited = false;
        } else {
            self.fields.push(field);
        }
    }

    /// Remove a field by name (case-insensitive). Returns true if removed.
    pub fn remove_field(&mut self, name: &str) -> bool {
        let name = name.to_lowercase();
        let before = self.fields.len();
        self.fields.retain(|f| f.name != name);
        self.resolved_fields.remove(&name);
        before != self.fields.len()
    }

    /// Get a field's raw value by name (case-insensitive).
    pub fn field(&self, name: &str) -> Option<&RawValue> {
        let name = name.to_lowercase();
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Get a field's text: the resolved value if the entry has been
    /// resolved, otherwise the raw literal text when the value is a single
    /// literal.
    pub fn field_text(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        if let Some(resolved) = self.resolved_fields.get(&name) {
            return Some(resolved.as_str());
        }
        match self.field(&name) {
            Some(RawValue::Literal(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Get the title field.
    pub fn title(&self) -> Option<&str> {
        self.field_text("title")
    }

    /// Get the author field.
    pub fn author(&self) -> Option<&str> {
        self.field_text("author")
    }

    /// Get the year field.
    pub fn year(&self) -> Option<&str> {
        self.field_text("year")
    }

    /// Get the journal field.
    pub fn journal(&self) -> Option<&str> {
        self.field_text("journal")
    }

    /// Get the DOI field.
    pub fn doi(&self) -> Option<&str> {
        self.field_text("doi")
    }
}

/// A bibliography: entries plus the string-variable table.
///
/// Owned exclusively by the caller; `resolve` and `serialize` take it by
/// value or reference and never share state across calls. The variable map
/// is a `BTreeMap` so serialization order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibTeXDocument {
    pub entries: Vec<BibTeXEntry>,
    pub variables: BTreeMap<String, String>,
}

impl BibTeXDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or overwrite a string variable. The last definition for a key
    /// wins, matching `@string` semantics.
    pub fn define_variable(&mut self, var: StringVariable) {
        self.variables.insert(var.key, var.value);
    }

    /// Look up a document-defined variable, case-insensitively.
    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Find an entry by cite key (case-insensitive).
    pub fn entry(&self, cite_key: &str) -> Option<&BibTeXEntry> {
        self.entries
            .iter()
            .find(|e| e.cite_key.eq_ignore_ascii_case(cite_key))
    }

    /// Find an entry by cite key (case-insensitive), mutably.
    pub fn entry_mut(&mut self, cite_key: &str) -> Option<&mut BibTeXEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.cite_key.eq_ignore_ascii_case(cite_key))
    }

    /// Append an entry.
    pub fn add_entry(&mut self, entry: BibTeXEntry) {
        self.entries.push(entry);
    }

    /// Replace the entry with the same cite key, or append if absent.
    pub fn replace_entry(&mut self, entry: BibTeXEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.cite_key.eq_ignore_ascii_case(&entry.cite_key))
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove an entry by cite key. Returns true if removed.
    pub fn remove_entry(&mut self, cite_key: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !e.cite_key.eq_ignore_ascii_case(cite_key));
        before != self.entries.len()
    }
}
