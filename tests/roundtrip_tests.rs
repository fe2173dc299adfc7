//! Round-trip and property tests
//!
//! The engine's central guarantee: serializing a resolved document and
//! parsing it back preserves resolved field content, and a second cycle is
//! byte-stable.

use proptest::prelude::*;

use im_bibfile::{parse, resolve, serialize, BibTeXDocument};

fn cycle(input: &str) -> (BibTeXDocument, String) {
    let doc = resolve(parse(input).document);
    let text = serialize(&doc);
    (doc, text)
}

// === Concrete Round Trips ===

#[test]
fn test_second_cycle_is_byte_stable() {
    let input = r#"
@string{me = "Smith, John"}
@string{jphys = "Journal of Physics"}

@proceedings{conf1,
    booktitle = {Proc. of the Conference},
    publisher = {ACME},
    year = {2020}
}

@inproceedings{paper1,
    crossref = {conf1},
    author = me # " and " # "Doe, Jane",
    title = {A {Careful} Study},
    month = jan,
    journal = jphys # " Letters"
}
"#;
    let (_, first) = cycle(input);
    let (_, second) = cycle(&first);
    assert_eq!(first, second);
}

#[test]
fn test_roundtrip_preserves_resolved_output() {
    let input = r#"
@string{pub = "University Press"}
@book{b1, title = {The  Elements}, publisher = pub, year = {1986}, month = sep}
@incollection{c1, crossref = {b1}, title = {Chapter Two}, pages = {10--20}}
"#;
    let (before, text) = cycle(input);
    let (after, _) = cycle(&text);

    assert_eq!(before.entries.len(), after.entries.len());
    for (a, b) in before.entries.iter().zip(after.entries.iter()) {
        assert_eq!(a.cite_key, b.cite_key);
        assert_eq!(a.resolved_fields, b.resolved_fields);
        assert_eq!(a.authors, b.authors);
    }
}

#[test]
fn test_roundtrip_output_always_reparses_cleanly() {
    let input = r#"
@article{weird, title = {Braces {inside {inside}}}, note = { leading and trailing }}
@misc{bare, year = 2024, month = dec}
"#;
    let (_, text) = cycle(input);
    let reparsed = parse(&text);
    assert!(reparsed.diagnostics.is_empty(), "output: {}", text);
    assert_eq!(reparsed.document.entries.len(), 2);
}

#[test]
fn test_author_list_survives_roundtrip() {
    let input = "@article{k, author = {{Acme Corp} and John Smith and Doe, Jane}}";
    let (before, text) = cycle(input);
    let (after, _) = cycle(&text);
    assert_eq!(before.entries[0].authors, after.entries[0].authors);
    assert_eq!(after.entries[0].authors.len(), 3);
}

#[test]
fn test_resolving_twice_equals_resolving_once() {
    let input = r#"
@string{me = "Smith, John"}
@proceedings{k1, publisher = {ACME}}
@inproceedings{k2, crossref = {k1}, author = me, month = jan}
"#;
    let once = resolve(parse(input).document);
    let twice = resolve(once.clone());
    assert_eq!(once, twice);
}

// === Generated Documents ===

fn field_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["title", "journal", "note", "series", "publisher"])
}

fn field_value() -> impl Strategy<Value = String> {
    // Literal text without delimiter or operator characters; the scanner's
    // whitespace collapse makes multi-space runs equivalent to one space.
    prop::string::string_regex("[A-Za-z0-9][A-Za-z0-9 .:-]{0,18}").unwrap()
}

fn cite_key() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9]{0,7}").unwrap()
}

fn entry_text() -> impl Strategy<Value = String> {
    (
        cite_key(),
        prop::collection::vec((field_name(), field_value()), 0..4),
    )
        .prop_map(|(key, fields)| {
            let mut text = format!("@article{{{}", key);
            for (name, value) in fields {
                text.push_str(&format!(",\n  {} = {{{}}}", name, value));
            }
            text.push_str("\n}");
            text
        })
}

proptest! {
    #[test]
    fn prop_roundtrip_preserves_resolved_fields(
        entries in prop::collection::vec(entry_text(), 1..5)
    ) {
        let input = entries.join("\n\n");
        let (before, text) = cycle(&input);
        let (after, _) = cycle(&text);

        prop_assert_eq!(before.entries.len(), after.entries.len());
        for (a, b) in before.entries.iter().zip(after.entries.iter()) {
            prop_assert_eq!(&a.cite_key, &b.cite_key);
            prop_assert_eq!(&a.resolved_fields, &b.resolved_fields);
        }
    }

    #[test]
    fn prop_serialized_output_is_balanced(
        entries in prop::collection::vec(entry_text(), 1..5)
    ) {
        let input = entries.join("\n\n");
        let (_, text) = cycle(&input);
        prop_assert_eq!(
            text.matches('{').count(),
            text.matches('}').count()
        );
        prop_assert!(parse(&text).diagnostics.is_empty());
    }

    #[test]
    fn prop_resolution_is_idempotent(
        entries in prop::collection::vec(entry_text(), 1..5)
    ) {
        let input = entries.join("\n\n");
        let once = resolve(parse(&input).document);
        let twice = resolve(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_parse_never_panics(input in "\\PC{0,200}") {
        let _ = parse(&input);
    }
}
