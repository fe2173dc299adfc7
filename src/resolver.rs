//! BibTeX resolution
//!
//! Computes resolved field values from raw ones: string-variable
//! substitution, `#` concatenation, built-in month macros, author-name
//! normalization, and single-level crossref inheritance.
//!
//! Resolution is a pure function of the document and never fails: a
//! reference to an unknown variable resolves to its own token text.

use std::collections::BTreeMap;

use crate::entry::{AuthorName, BibTeXDocument, BibTeXField, FieldKind, RawValue, ValueSegment};
use crate::months;

/// Resolve a document, filling `resolved_fields` and `authors` on every
/// entry. Resolving twice yields the same result.
pub fn resolve(mut doc: BibTeXDocument) -> BibTeXDocument {
    for entry in &mut doc.entries {
        // Inherited fields are recomputed below; stale copies from an
        // earlier resolve must not mask a changed crossref target.
        entry.fields.retain(|f| !f.inherited);
        entry.resolved_fields.clear();
        entry.authors.clear();

        for field in &entry.fields {
            let resolved = resolve_value(&field.value, &doc.variables);
            entry.resolved_fields.insert(field.name.clone(), resolved);
        }

        if let Some(field) = entry.fields.iter().find(|f| f.kind == FieldKind::Author) {
            entry.authors = parse_authors(&field.value);
        }
    }

    apply_crossrefs(&mut doc);
    doc
}

/// Resolve a raw value to its final text. Concatenation segments are joined
/// with no separator, per the `#` operator's semantics.
pub fn resolve_value(value: &RawValue, variables: &BTreeMap<String, String>) -> String {
    match value {
        RawValue::Literal(text) => text.clone(),
        RawValue::Variable(name) => substitute(name, variables),
        RawValue::Concat(segments) => segments
            .iter()
            .map(|segment| match segment {
                ValueSegment::Literal(text) => text.clone(),
                ValueSegment::Variable(name) => substitute(name, variables),
            })
            .collect(),
    }
}

/// Look up a variable: document definitions first, then the built-in month
/// macros, falling back to the token's own text.
fn substitute(name: &str, variables: &BTreeMap<String, String>) -> String {
    if let Some(value) = variables.get(&name.to_lowercase()) {
        return value.clone();
    }
    if let Some(month) = months::expand_month_macro(name) {
        return month.to_string();
    }
    name.to_string()
}

/// Parse an author field value into a normalized author list.
fn parse_authors(value: &RawValue) -> Vec<AuthorName> {
    match value {
        RawValue::Variable(name) => vec![AuthorName::Literal(name.clone())],
        RawValue::Literal(text) => split_author_list(text)
            .iter()
            .map(|name| normalize_author(name))
            .collect(),
        RawValue::Concat(segments) => {
            let mut authors = Vec::new();
            for segment in segments {
                match segment {
                    ValueSegment::Variable(name) => {
                        authors.push(AuthorName::Literal(name.clone()));
                    }
                    // A literal " and " segment is the joiner between
                    // variable-backed authors, not a name.
                    ValueSegment::Literal(text) if text.trim() == "and" => {}
                    ValueSegment::Literal(text) => {
                        for name in split_author_list(text) {
                            authors.push(normalize_author(&name));
                        }
                    }
                }
            }
            authors
        }
    }
}

/// Split an author list on the whole-word token `and`, case-insensitively,
/// at brace depth zero. Brace-protected names like `{Barnes and Noble}` are
/// not split.
fn split_author_list(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut depth = 0i32;

    for token in text.split_whitespace() {
        if depth == 0 && token.eq_ignore_ascii_case("and") {
            if !current.is_empty() {
                pieces.push(current.join(" "));
                current.clear();
            }
            continue;
        }
        for c in token.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
        current.push(token);
    }
    if !current.is_empty() {
        pieces.push(current.join(" "));
    }
    pieces
}

/// Normalize one author name.
///
/// - Wrapped in outer braces: kept verbatim as a Literal (corporate names
///   are protected from "Last, First" inversion).
/// - Contains a comma: split on the first comma; the remainder, re-joined
///   with ", ", is the first name.
/// - No comma: the final whitespace-delimited token is the last name.
fn normalize_author(name: &str) -> AuthorName {
    let name = name.trim();

    if name.len() >= 2 && name.starts_with('{') && name.ends_with('}') {
        return AuthorName::Literal(name[1..name.len() - 1].trim().to_string());
    }

    if let Some(comma) = name.find(',') {
        let last = name[..comma].trim().to_string();
        let first = name[comma + 1..]
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        return AuthorName::Normalized { last, first };
    }

    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    match tokens.pop() {
        Some(last) => AuthorName::Normalized {
            last: last.to_string(),
            first: tokens.join(" "),
        },
        None => AuthorName::Literal(String::new()),
    }
}

/// Single-level crossref inheritance: fields present on the target and
/// absent on the child are copied (raw and resolved) onto the child. Fields
/// the target itself inherited are not copied further, so chains and cycles
/// stop after one hop.
fn apply_crossrefs(doc: &mut BibTeXDocument) {
    for child_idx in 0..doc.entries.len() {
        let Some(target_key) = doc.entries[child_idx].resolved_fields.get("crossref").cloned()
        else {
            continue;
        };
        let Some(target_idx) = doc
            .entries
            .iter()
            .position(|e| e.cite_key.eq_ignore_ascii_case(&target_key))
        else {
            continue;
        };
        if target_idx == child_idx {
            continue;
        }

        let inherited: Vec<(BibTeXField, Option<String>)> = doc.entries[target_idx]
            .fields
            .iter()
            .filter(|f| !f.inherited)
            .map(|f| {
                (
                    f.clone(),
                    doc.entries[target_idx].resolved_fields.get(&f.name).cloned(),
                )
            })
            .collect();

        let child = &mut doc.entries[child_idx];
        for (field, resolved) in inherited {
            if child.field(&field.name).is_some() {
                continue;
            }
            let name = field.name.clone();
            child.fields.push(BibTeXField {
                inherited: true,
                ..field
            });
            if let Some(resolved) = resolved {
                child.resolved_fields.insert(name, resolved);
            }
        }
    }
}
