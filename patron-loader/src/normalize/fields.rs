//! Cell-level parsers
//!
//! Every parser here is total: it never fails, it only decides between a
//! value and "absent". The one parser that can meet an unrecognized value
//! (`parse_month`) hands a [`ParseWarning`] back to the caller instead of
//! logging it itself.

/// A recognized-but-unparseable value. The field is set to absent and the
/// row continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    UnrecognizedMonth(String),
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseWarning::UnrecognizedMonth(raw) => {
                write!(f, "can't recognize month name: '{}'", raw)
            }
        }
    }
}

/// Outcome of a parser that may warn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub value: Option<T>,
    pub warning: Option<ParseWarning>,
}

impl<T> Parsed<T> {
    fn present(value: T) -> Self {
        Self {
            value: Some(value),
            warning: None,
        }
    }

    fn absent() -> Self {
        Self {
            value: None,
            warning: None,
        }
    }

    fn warned(warning: ParseWarning) -> Self {
        Self {
            value: None,
            warning: Some(warning),
        }
    }
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Trim one cell and fold embedded line breaks into single spaces
pub fn trim_cell(cell: &str) -> String {
    cell.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

/// Apply [`trim_cell`] to every cell of a row
pub fn trim_row(row: &[String]) -> Vec<String> {
    row.iter().map(|cell| trim_cell(cell)).collect()
}

/// Month name to 1..=12, case-insensitive
pub fn parse_month(raw: &str) -> Parsed<u8> {
    let name = raw.trim();
    if name.is_empty() {
        return Parsed::absent();
    }

    let lower = name.to_lowercase();
    match MONTHS.iter().position(|m| *m == lower) {
        Some(index) => Parsed::present(index as u8 + 1),
        None => Parsed::warned(ParseWarning::UnrecognizedMonth(name.to_string())),
    }
}

/// Empty to absent, anything else trimmed
pub fn parse_optional_string(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Email, with boolean-looking sentinels and values lacking `@` treated as unknown
pub fn parse_email(raw: &str) -> Option<String> {
    let email = raw.trim();
    if email.is_empty()
        || email.eq_ignore_ascii_case("true")
        || email.eq_ignore_ascii_case("false")
        || !email.contains('@')
    {
        return None;
    }
    Some(email.to_string())
}

/// True only for a case-insensitive "true"
pub fn parse_bool(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_sentinels() {
        assert_eq!(parse_email("True"), None);
        assert_eq!(parse_email("FALSE"), None);
        assert_eq!(parse_email(""), None);
        assert_eq!(parse_email("   "), None);
        assert_eq!(parse_email("not-an-email"), None);
        assert_eq!(parse_email(" a@b.com "), Some("a@b.com".to_string()));
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("January").value, Some(1));
        assert_eq!(parse_month("december").value, Some(12));
        assert_eq!(parse_month("  MAY ").value, Some(5));

        let empty = parse_month("");
        assert_eq!(empty.value, None);
        assert_eq!(empty.warning, None);

        let smarch = parse_month("Smarch");
        assert_eq!(smarch.value, None);
        assert_eq!(
            smarch.warning,
            Some(ParseWarning::UnrecognizedMonth("Smarch".to_string()))
        );
    }

    #[test]
    fn test_parse_month_rejects_abbreviations() {
        assert_eq!(parse_month("Jan").value, None);
        assert!(parse_month("Jan").warning.is_some());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" True "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
        assert!(!parse_bool("yes"));
        assert!(!parse_bool("1"));
    }

    #[test]
    fn test_parse_optional_string() {
        assert_eq!(parse_optional_string(""), None);
        assert_eq!(parse_optional_string("  "), None);
        assert_eq!(parse_optional_string(" 2023 "), Some("2023".to_string()));
    }

    #[test]
    fn test_trim_row_collapses_newlines() {
        let row = vec![
            "  ADULT ".to_string(),
            "Main\nLibrary".to_string(),
            "a\r\nb".to_string(),
            "\n".to_string(),
        ];
        assert_eq!(trim_row(&row), vec!["ADULT", "Main Library", "a b", ""]);
    }

    #[test]
    fn test_warning_display() {
        let warning = ParseWarning::UnrecognizedMonth("Smarch".to_string());
        assert_eq!(warning.to_string(), "can't recognize month name: 'Smarch'");
    }
}
