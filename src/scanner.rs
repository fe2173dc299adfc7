//! BibTeX scanner
//!
//! Turns raw text into a document of raw entries and string-variable
//! definitions. Handles:
//! - @string definitions and @preamble declarations
//! - @comment sections
//! - Braced and quoted field values, with nested braces
//! - String concatenation with #, preserved for round-tripping
//! - `%` line comments
//!
//! The scanner never fails: unparseable blocks are skipped and recorded as
//! diagnostics, and free text between blocks is ignored.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entry::{BibTeXDocument, BibTeXEntry, RawValue, StringVariable, ValueSegment};

/// Why a block was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum DiagnosticKind {
    #[error("unbalanced block delimiters")]
    MalformedBlock,
    #[error("entry body has no cite key")]
    MissingKey,
}

/// A skipped block, with the line its `@` appeared on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDiagnostic {
    pub line: u32,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Result of scanning a BibTeX buffer: the partial document plus any
/// diagnostics for skipped blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub document: BibTeXDocument,
    pub diagnostics: Vec<ScanDiagnostic>,
}

/// Parse a BibTeX buffer.
///
/// Never panics; malformed blocks degrade to diagnostics and the rest of
/// the buffer is still scanned.
pub fn parse(input: &str) -> ParseOutcome {
    let stripped = strip_line_comments(input);
    let mut document = BibTeXDocument::new();
    let mut diagnostics = Vec::new();

    let mut remaining = stripped.as_str();
    let mut line = 1u32;

    while let Some(at) = remaining.find('@') {
        line += remaining[..at].matches('\n').count() as u32;
        remaining = &remaining[at..];

        match scan_block(remaining, &document.variables) {
            Ok((rest, block)) => {
                let consumed = &remaining[..remaining.len() - rest.len()];
                line += consumed.matches('\n').count() as u32;
                match block {
                    Block::Entry(entry) => document.entries.push(entry),
                    Block::Variable(var) => document.define_variable(var),
                    Block::Comment => {}
                }
                remaining = rest;
            }
            Err(failure) => {
                if let Some(kind) = failure.kind {
                    diagnostics.push(ScanDiagnostic {
                        line,
                        kind,
                        message: failure.message,
                    });
                }
                let resume = failure.resume_offset.min(remaining.len()).max(1);
                line += remaining[..resume].matches('\n').count() as u32;
                remaining = &remaining[resume..];
            }
        }
    }

    ParseOutcome {
        document,
        diagnostics,
    }
}

/// Parse a fragment and return its first entry, if any.
pub fn parse_entry(input: &str) -> Option<BibTeXEntry> {
    parse(input).document.entries.into_iter().next()
}

/// One top-level @-block.
enum Block {
    Entry(BibTeXEntry),
    Variable(StringVariable),
    Comment,
}

/// A skipped block: optional diagnostic plus where to resume scanning,
/// relative to the block's `@`.
struct BlockFailure {
    kind: Option<DiagnosticKind>,
    message: String,
    resume_offset: usize,
}

impl BlockFailure {
    /// An `@` that does not start a block (free text); skip it silently.
    fn not_a_block() -> Self {
        Self {
            kind: None,
            message: String::new(),
            resume_offset: 1,
        }
    }
}

/// Strip `%` line comments before block scanning.
///
/// This is a blanket per-line strip: an unescaped `%` truncates the line
/// even inside a quoted value, matching the historical format quirk.
/// `\%` survives. Newlines are preserved so diagnostic line numbers stay
/// accurate.
fn strip_line_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for line in input.split_inclusive('\n') {
        let mut cut = line.len();
        let mut escaped = false;
        for (i, c) in line.char_indices() {
            match c {
                '%' if !escaped => {
                    cut = i;
                    break;
                }
                '\\' => escaped = !escaped,
                _ => escaped = false,
            }
        }
        out.push_str(&line[..cut]);
        if cut < line.len() && line.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Parse `@ type` and return the remaining input and the type token.
fn block_header(input: &str) -> IResult<&str, &str> {
    let (rest, _) = char('@')(input)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, block_type) = take_while1(|c: char| c.is_ascii_alphabetic())(rest)?;
    Ok((rest, block_type))
}

/// Scan one @-block starting at `input[0] == '@'`.
fn scan_block<'a>(
    input: &'a str,
    variables: &BTreeMap<String, String>,
) -> Result<(&'a str, Block), BlockFailure> {
    let (after_header, block_type) =
        block_header(input).map_err(|_| BlockFailure::not_a_block())?;

    let body = after_header.trim_start();
    let header_len = input.len() - body.len();
    let (open, close) = match body.chars().next() {
        Some('{') => ('{', '}'),
        Some('(') => ('(', ')'),
        _ => return Err(BlockFailure::not_a_block()),
    };

    let Some((interior, rest)) = balanced_interior(body, open, close) else {
        return Err(BlockFailure {
            kind: Some(DiagnosticKind::MalformedBlock),
            message: format!("no balanced close for @{} block", block_type),
            // Resume just past the unmatched opening delimiter.
            resume_offset: header_len + 1,
        });
    };
    let after_block = input.len() - rest.len();

    match block_type.to_lowercase().as_str() {
        "comment" => Ok((rest, Block::Comment)),
        "string" | "preamble" => match parse_assignment(interior, variables) {
            Some(var) => Ok((rest, Block::Variable(var))),
            None => Err(BlockFailure {
                kind: Some(DiagnosticKind::MalformedBlock),
                message: format!("@{} body is not a key = value pair", block_type),
                resume_offset: after_block,
            }),
        },
        entry_type => match parse_entry_block(entry_type, interior) {
            Some(entry) => Ok((rest, Block::Entry(entry))),
            None => Err(BlockFailure {
                kind: Some(DiagnosticKind::MissingKey),
                message: format!("@{} entry has no cite key", entry_type),
                resume_offset: after_block,
            }),
        },
    }
}

/// Find the balanced close for the delimiter at `input[0]` and split the
/// input into the interior and the rest.
///
/// For `(` blocks, parens inside braces do not count toward the balance.
/// A `\` escapes the following character.
fn balanced_interior(input: &str, open: char, close: char) -> Option<(&str, &str)> {
    let bytes = input.as_bytes();
    let mut depth = 0i32;
    let mut brace_depth = 0i32;
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        if b == b'\\' {
            pos += 2;
            continue;
        }
        if b == open as u8 && (open == '{' || brace_depth == 0) {
            depth += 1;
        } else if b == close as u8 && (open == '{' || brace_depth == 0) {
            depth -= 1;
            if depth == 0 {
                return Some((&input[1..pos], &input[pos + 1..]));
            }
        } else if b == b'{' {
            brace_depth += 1;
        } else if b == b'}' {
            brace_depth -= 1;
        }
        pos += 1;
    }

    None
}

/// Parse the interior of a `@string` or `@preamble` block as one
/// `key = value` pair, flattening the value against the variables defined
/// so far.
fn parse_assignment(
    interior: &str,
    variables: &BTreeMap<String, String>,
) -> Option<StringVariable> {
    let (rest, key) = field_header(interior).ok()?;
    let (_, value) = parse_value(rest)?;
    Some(StringVariable::new(key, flatten_value(&value, variables)))
}

/// Flatten a raw value to plain text: literals as-is, variable references
/// substituted when known, otherwise their own token text.
fn flatten_value(value: &RawValue, variables: &BTreeMap<String, String>) -> String {
    let lookup = |name: &str| {
        variables
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| name.to_string())
    };
    match value {
        RawValue::Literal(text) => text.clone(),
        RawValue::Variable(name) => lookup(name),
        RawValue::Concat(segments) => segments
            .iter()
            .map(|segment| match segment {
                ValueSegment::Literal(text) => text.clone(),
                ValueSegment::Variable(name) => lookup(name),
            })
            .collect(),
    }
}

/// Parse an entry block interior: cite key up to the first top-level comma,
/// then the field list. Returns None when the body has no cite key.
fn parse_entry_block(entry_type: &str, interior: &str) -> Option<BibTeXEntry> {
    let comma = find_top_level(interior, ',')?;
    let cite_key = interior[..comma].trim();
    if cite_key.is_empty() {
        return None;
    }

    let mut entry = BibTeXEntry::new(entry_type, cite_key);
    parse_fields(&interior[comma + 1..], &mut entry);
    Some(entry)
}

/// Parse fields until the interior is exhausted or a field fails to parse.
/// Partial entries keep whatever fields were already parsed.
fn parse_fields(input: &str, entry: &mut BibTeXEntry) {
    let mut remaining = input;
    loop {
        let Ok((rest, name)) = field_header(remaining) else {
            return;
        };
        let Some((rest, value)) = parse_value(rest) else {
            return;
        };
        entry.set_field(name, value);

        let rest = rest.trim_start();
        remaining = rest.strip_prefix(',').unwrap_or(rest);
    }
}

/// Parse `identifier \s* = \s*` and return the identifier.
fn field_header(input: &str) -> IResult<&str, &str> {
    let (rest, _) = multispace0(input)?;
    let (rest, name) =
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('=')(rest)?;
    let (rest, _) = multispace0(rest)?;
    Ok((rest, name))
}

/// Parse one field value: everything up to the next top-level comma,
/// split on top-level `#` into a concatenation list.
fn parse_value(input: &str) -> Option<(&str, RawValue)> {
    let end = find_top_level(input, ',').unwrap_or(input.len());
    let (text, rest) = input.split_at(end);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut segments = Vec::new();
    for piece in split_top_level(text, '#') {
        segments.push(classify_segment(piece.trim())?);
    }

    let value = if segments.len() == 1 {
        match segments.remove(0) {
            ValueSegment::Literal(text) => RawValue::Literal(text),
            ValueSegment::Variable(name) => RawValue::Variable(name),
        }
    } else {
        RawValue::Concat(segments)
    };
    Some((rest, value))
}

/// Classify one `#`-segment: braced literal, quoted literal, or bare token
/// presumed to name a variable.
fn classify_segment(segment: &str) -> Option<ValueSegment> {
    if segment.starts_with('{') {
        let (inner, _) = balanced_interior(segment, '{', '}')?;
        Some(ValueSegment::Literal(normalize_literal(inner)))
    } else if segment.starts_with('"') {
        let inner = quoted_inner(segment)?;
        Some(ValueSegment::Literal(normalize_literal(inner)))
    } else if segment.is_empty() {
        None
    } else {
        Some(ValueSegment::Variable(segment.to_string()))
    }
}

/// Content between `segment[0] == '"'` and the next unescaped `"`.
fn quoted_inner(segment: &str) -> Option<&str> {
    let bytes = segment.as_bytes();
    let mut pos = 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 1,
            b'"' => return Some(&segment[1..pos]),
            _ => {}
        }
        pos += 1;
    }
    None
}

/// Collapse whitespace runs inside a parsed literal to a single space.
fn normalize_literal(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(c);
            prev_was_space = false;
        }
    }
    result
}

/// Find `needle` at brace depth zero, outside quoted substrings.
fn find_top_level(input: &str, needle: char) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        if b == b'\\' {
            pos += 2;
            continue;
        }
        if in_quote {
            if b == b'"' {
                in_quote = false;
            }
        } else if b == b'{' {
            depth += 1;
        } else if b == b'}' {
            depth -= 1;
        } else if b == b'"' && depth == 0 {
            in_quote = true;
        } else if b == needle as u8 && depth == 0 {
            return Some(pos);
        }
        pos += 1;
    }

    None
}

/// Split on top-level occurrences of `separator`.
fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut remaining = input;
    while let Some(pos) = find_top_level(remaining, separator) {
        pieces.push(&remaining[..pos]);
        remaining = &remaining[pos + separator.len_utf8()..];
    }
    pieces.push(remaining);
    pieces
}
