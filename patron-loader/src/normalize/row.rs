//! Row validation: positional cells to the four entities

use super::fields::{
    ParseWarning, parse_bool, parse_email, parse_month, parse_optional_string, trim_row,
};
use crate::model::{LibraryRef, NotificationTypeRef, PatronRecord, PatronTypeRef, Reference};

/// Minimum number of cells a data row must carry
pub const REQUIRED_COLUMNS: usize = 14;

mod col {
    pub const PATRON_TYPE_CODE: usize = 0;
    pub const PATRON_TYPE_DESCRIPTION: usize = 1;
    pub const CHECKOUT_TOTAL: usize = 2;
    pub const RENEWAL_TOTAL: usize = 3;
    pub const AGE_RANGE: usize = 4;
    pub const HOME_LIBRARY_CODE: usize = 5;
    pub const HOME_LIBRARY_NAME: usize = 6;
    pub const ACTIVE_MONTH: usize = 7;
    pub const ACTIVE_YEAR: usize = 8;
    pub const NOTIFICATION_TYPE_CODE: usize = 9;
    pub const NOTIFICATION_TYPE_DESCRIPTION: usize = 10;
    pub const EMAIL: usize = 11;
    pub const WITHIN_SF_COUNTY: usize = 12;
    pub const YEAR_REGISTERED: usize = 13;
}

/// Why a row contributes nothing to the load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    InsufficientColumns { found: usize, required: usize },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::InsufficientColumns { found, required } => {
                write!(f, "insufficient columns (has {}, needs {})", found, required)
            }
        }
    }
}

impl std::error::Error for RejectionReason {}

/// A row that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
    pub patron_type: PatronTypeRef,
    pub library: LibraryRef,
    pub notification_type: NotificationTypeRef,
    pub patron: PatronRecord,
    pub warnings: Vec<ParseWarning>,
}

impl ValidatedRow {
    /// The three references in the order the loader upserts them
    pub fn references(&self) -> [Reference; 3] {
        [
            Reference::PatronType(self.patron_type.clone()),
            Reference::Library(self.library.clone()),
            Reference::NotificationType(self.notification_type.clone()),
        ]
    }
}

/// Validate and normalize one raw data row
///
/// The column count is checked on the raw row before anything else, so a
/// rejected row never yields partial reference data.
pub fn validate_row(raw: &[String]) -> Result<ValidatedRow, RejectionReason> {
    if raw.len() < REQUIRED_COLUMNS {
        return Err(RejectionReason::InsufficientColumns {
            found: raw.len(),
            required: REQUIRED_COLUMNS,
        });
    }

    let row = trim_row(raw);
    let cell = |index: usize| row[index].clone();

    let mut warnings = Vec::new();
    let month = parse_month(&row[col::ACTIVE_MONTH]);
    warnings.extend(month.warning);

    let patron_type = PatronTypeRef {
        code: cell(col::PATRON_TYPE_CODE),
        description: cell(col::PATRON_TYPE_DESCRIPTION),
    };
    let library = LibraryRef {
        code: cell(col::HOME_LIBRARY_CODE),
        name: cell(col::HOME_LIBRARY_NAME),
    };
    let notification_type = NotificationTypeRef {
        code: cell(col::NOTIFICATION_TYPE_CODE),
        description: cell(col::NOTIFICATION_TYPE_DESCRIPTION),
    };

    let patron = PatronRecord {
        patron_type_code: patron_type.code.clone(),
        patron_type_description: patron_type.description.clone(),
        checkout_total: cell(col::CHECKOUT_TOTAL),
        renewal_total: cell(col::RENEWAL_TOTAL),
        age_range: cell(col::AGE_RANGE),
        home_library_code: library.code.clone(),
        home_library_name: library.name.clone(),
        active_month: month.value,
        active_year: parse_optional_string(&row[col::ACTIVE_YEAR]),
        notification_type_code: notification_type.code.clone(),
        notification_type_description: notification_type.description.clone(),
        email: parse_email(&row[col::EMAIL]),
        within_sf_county: parse_bool(&row[col::WITHIN_SF_COUNTY]),
        year_registered: parse_optional_string(&row[col::YEAR_REGISTERED]),
    };

    Ok(ValidatedRow {
        patron_type,
        library,
        notification_type,
        patron,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sample_row() -> Vec<String> {
        row(&[
            "0",
            "ADULT",
            "42",
            "7",
            "25 to 34 years",
            "X",
            " Main\nLibrary ",
            "March",
            "2023",
            "z",
            "email",
            "TRUE",
            "True",
            "2011",
        ])
    }

    #[test]
    fn test_validate_row_maps_columns() {
        let validated = validate_row(&sample_row()).unwrap();

        assert_eq!(validated.patron_type.code, "0");
        assert_eq!(validated.patron_type.description, "ADULT");
        assert_eq!(validated.library.name, "Main Library");
        assert_eq!(validated.notification_type.code, "z");

        let patron = &validated.patron;
        assert_eq!(patron.checkout_total, "42");
        assert_eq!(patron.renewal_total, "7");
        assert_eq!(patron.age_range, "25 to 34 years");
        assert_eq!(patron.home_library_name, "Main Library");
        assert_eq!(patron.active_month, Some(3));
        assert_eq!(patron.active_year.as_deref(), Some("2023"));
        assert_eq!(patron.email, None);
        assert!(patron.within_sf_county);
        assert_eq!(patron.year_registered.as_deref(), Some("2011"));
        assert!(validated.warnings.is_empty());
    }

    #[test]
    fn test_validate_row_rejects_short_rows() {
        let short = row(&["A"; 13]);
        assert_eq!(
            validate_row(&short),
            Err(RejectionReason::InsufficientColumns {
                found: 13,
                required: REQUIRED_COLUMNS
            })
        );
        assert!(validate_row(&[]).is_err());
    }

    #[test]
    fn test_validate_row_ignores_extra_columns() {
        let mut wide = sample_row();
        wide.push("extra".to_string());
        assert!(validate_row(&wide).is_ok());
    }

    #[test]
    fn test_validate_row_collects_month_warning() {
        let mut cells = sample_row();
        cells[7] = "Smarch".to_string();
        cells[8] = String::new();

        let validated = validate_row(&cells).unwrap();
        assert_eq!(validated.patron.active_month, None);
        assert_eq!(validated.patron.active_year, None);
        assert_eq!(
            validated.warnings,
            vec![ParseWarning::UnrecognizedMonth("Smarch".to_string())]
        );
    }

    #[test]
    fn test_references_order() {
        let validated = validate_row(&sample_row()).unwrap();
        let codes: Vec<_> = validated
            .references()
            .iter()
            .map(|r| r.code().to_string())
            .collect();
        assert_eq!(codes, vec!["0", "X", "z"]);
    }

    #[test]
    fn test_rejection_display() {
        let reason = RejectionReason::InsufficientColumns {
            found: 10,
            required: 14,
        };
        assert_eq!(reason.to_string(), "insufficient columns (has 10, needs 14)");
    }
}
