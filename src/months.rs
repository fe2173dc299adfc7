//! Built-in month macros
//!
//! BibTeX predefines the twelve three-letter month abbreviations as string
//! variables. They have lower precedence than document-defined variables:
//! a document `@string{jan = ...}` overrides the built-in.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    /// Dictionary mapping month abbreviations to full English month names.
    static ref MONTHS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("jan", "January");
        m.insert("feb", "February");
        m.insert("mar", "March");
        m.insert("apr", "April");
        m.insert("may", "May");
        m.insert("jun", "June");
        m.insert("jul", "July");
        m.insert("aug", "August");
        m.insert("sep", "September");
        m.insert("oct", "October");
        m.insert("nov", "November");
        m.insert("dec", "December");
        m
    };
}

/// Expand a month macro to its full name, case-insensitively.
pub fn expand_month_macro(name: &str) -> Option<&'static str> {
    MONTHS.get(name.to_lowercase().as_str()).copied()
}

/// Check whether a name is a built-in month macro.
pub fn is_month_macro(name: &str) -> bool {
    MONTHS.contains_key(name.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("jan", "January")]
    #[test_case("may", "May")]
    #[test_case("sep", "September")]
    #[test_case("dec", "December")]
    fn test_expand_month_macro(abbrev: &str, full: &str) {
        assert_eq!(expand_month_macro(abbrev), Some(full));
    }

    #[test]
    fn test_expand_is_case_insensitive() {
        assert_eq!(expand_month_macro("JAN"), Some("January"));
        assert_eq!(expand_month_macro("Oct"), Some("October"));
    }

    #[test]
    fn test_unknown_names_rejected() {
        assert_eq!(expand_month_macro("janvier"), None);
        assert!(!is_month_macro("smarch"));
        assert!(is_month_macro("feb"));
    }
}
