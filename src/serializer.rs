//! BibTeX serialization
//!
//! Converts a document back to BibTeX text: `@string` definitions first,
//! then entries with their fields in original order. Fields that reference
//! string variables are re-emitted in `#` concatenation syntax so the
//! references survive a round trip.

use crate::entry::{AuthorName, BibTeXDocument, BibTeXEntry, FieldKind, RawValue, ValueSegment};
use crate::months;

/// Serialize a document to BibTeX text. The output is always syntactically
/// valid: every block closed, every field comma-terminated except the last.
pub fn serialize(doc: &BibTeXDocument) -> String {
    let mut result = String::new();

    for (key, value) in &doc.variables {
        result.push_str(&format_string_definition(key, value));
        result.push_str("\n\n");
    }

    for entry in &doc.entries {
        result.push_str(&format_entry(entry, doc));
        result.push_str("\n\n");
    }

    result.trim_end().to_string()
}

/// Format a `@string` definition line.
fn format_string_definition(key: &str, value: &str) -> String {
    if value.contains('"') {
        format!("@string{{{} = {{{}}}}}", key, value)
    } else {
        format!("@string{{{} = \"{}\"}}", key, value)
    }
}

/// Format one entry.
fn format_entry(entry: &BibTeXEntry, doc: &BibTeXDocument) -> String {
    let mut result = String::new();

    result.push('@');
    result.push_str(&entry.entry_type);
    result.push('{');
    result.push_str(&entry.cite_key);
    result.push(',');
    result.push('\n');

    let count = entry.fields.len();
    for (i, field) in entry.fields.iter().enumerate() {
        result.push_str("  ");
        result.push_str(&field.name);
        result.push_str(" = ");

        let rendered = if field.kind == FieldKind::Author && !entry.authors.is_empty() {
            format_author_field(&entry.authors, doc)
        } else {
            format_value(&field.value)
        };
        result.push_str(&rendered);

        if i + 1 < count {
            result.push(',');
        }
        result.push('\n');
    }

    result.push('}');
    result
}

/// Format a raw value, preserving variable references and `#` structure.
fn format_value(value: &RawValue) -> String {
    match value {
        RawValue::Literal(text) => format_literal(text),
        RawValue::Variable(name) => name.clone(),
        RawValue::Concat(segments) => segments
            .iter()
            .map(|segment| match segment {
                ValueSegment::Literal(text) => format_quoted(text),
                ValueSegment::Variable(name) => name.clone(),
            })
            .collect::<Vec<_>>()
            .join(" # "),
    }
}

/// Format the author field from the normalized author list.
///
/// If any author is a variable reference, the whole field becomes a
/// concatenation so the references survive; otherwise the simple braced
/// form with ` and ` separators is used.
fn format_author_field(authors: &[AuthorName], doc: &BibTeXDocument) -> String {
    let any_variable = authors
        .iter()
        .any(|a| matches!(a, AuthorName::Literal(text) if is_known_variable(text, doc)));

    if any_variable {
        authors
            .iter()
            .map(|author| match author {
                AuthorName::Literal(text) if is_known_variable(text, doc) => text.clone(),
                AuthorName::Literal(text) => format_quoted(&format!("{{{}}}", text)),
                normalized => format_quoted(&normalized.display()),
            })
            .collect::<Vec<_>>()
            .join(" # \" and \" # ")
    } else {
        let names: Vec<String> = authors
            .iter()
            .map(|author| match author {
                // Re-wrap protected literals so a re-parse does not split
                // them into first/last.
                AuthorName::Literal(text) => format!("{{{}}}", text),
                normalized => normalized.display(),
            })
            .collect();
        format!("{{{}}}", names.join(" and "))
    }
}

/// True when a literal author name actually refers to a string variable,
/// document-defined or built-in month.
fn is_known_variable(name: &str, doc: &BibTeXDocument) -> bool {
    doc.variable(name).is_some() || months::is_month_macro(name)
}

/// Brace a literal, quoting instead when its braces are unbalanced.
/// Purely numeric values are emitted bare, the conventional BibTeX form.
fn format_literal(text: &str) -> String {
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        return text.to_string();
    }
    if braces_balanced(text) {
        format!("{{{}}}", text)
    } else {
        format!("\"{}\"", text)
    }
}

/// Quote a concatenation segment, bracing instead when it contains a quote.
fn format_quoted(text: &str) -> String {
    if text.contains('"') {
        format!("{{{}}}", text)
    } else {
        format!("\"{}\"", text)
    }
}

fn braces_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
