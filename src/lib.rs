//! BibTeX file engine
//!
//! This crate parses, resolves, and re-serializes bibliography records in
//! the BibTeX text format, maintaining round-trip fidelity with the original
//! content.
//!
//! Features:
//! - Tolerant scanner for @-blocks with nested-brace balance and recovery
//! - @string variable definitions and `#` concatenation, preserved raw
//! - Built-in month macros and crossref field inheritance
//! - Author-name normalization ("Last, First", brace-protected literals)
//! - Serializer that re-emits variable references and concatenation syntax
//!
//! `parse`, `resolve`, and `serialize` are three independent pure functions:
//! a caller can re-resolve after an edit without re-parsing, and re-serialize
//! after an edit without re-resolving.

mod entry;
mod months;
mod resolver;
mod scanner;
mod serializer;

pub use entry::{
    AuthorName, BibTeXDocument, BibTeXEntry, BibTeXField, FieldKind, RawValue, StringVariable,
    ValueSegment,
};
pub use resolver::{resolve, resolve_value};
pub use scanner::{parse, parse_entry, DiagnosticKind, ParseOutcome, ScanDiagnostic};
pub use serializer::serialize;

// Re-export the month macro helpers
pub use months::{expand_month_macro, is_month_macro};
