//! Entity types produced by the normalizer and persisted by the store

use serde::Serialize;

/// A category of patron (e.g. "ADULT" / "Adult")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatronTypeRef {
    pub code: String,
    pub description: String,
}

/// A library branch (e.g. "X" / "Main Library")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRef {
    pub code: String,
    pub name: String,
}

/// A notification preference category (e.g. "z" / "email")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTypeRef {
    pub code: String,
    pub description: String,
}

/// One patron row after normalization
///
/// Reference codes are kept alongside their denormalized description/name so
/// the record can be queried either by code (joined against the reference
/// collections) or by label directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatronRecord {
    pub patron_type_code: String,
    pub patron_type_description: String,
    pub checkout_total: String,
    pub renewal_total: String,
    pub age_range: String,
    pub home_library_code: String,
    pub home_library_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_month: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_year: Option<String>,
    pub notification_type_code: String,
    pub notification_type_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub within_sf_county: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_registered: Option<String>,
}

impl PatronRecord {
    /// Compact JSON form for log lines, absent fields left out
    pub fn to_log_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable record: {}>", e))
    }
}

/// Any of the three reference entities, addressed uniformly by the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    PatronType(PatronTypeRef),
    Library(LibraryRef),
    NotificationType(NotificationTypeRef),
}

impl Reference {
    /// Collection this reference lives in
    pub fn collection(&self) -> Collection {
        match self {
            Reference::PatronType(_) => Collection::PatronTypes,
            Reference::Library(_) => Collection::Libraries,
            Reference::NotificationType(_) => Collection::NotificationTypes,
        }
    }

    /// Unique key
    pub fn code(&self) -> &str {
        match self {
            Reference::PatronType(r) => &r.code,
            Reference::Library(r) => &r.code,
            Reference::NotificationType(r) => &r.code,
        }
    }

    /// Description or name, whichever the entity carries
    pub fn label(&self) -> &str {
        match self {
            Reference::PatronType(r) => &r.description,
            Reference::Library(r) => &r.name,
            Reference::NotificationType(r) => &r.description,
        }
    }
}

/// Column value type, used by stores to decode rows without guessing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Bool,
}

/// A named column of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    const fn text(name: &'static str) -> Self {
        Self {
            name,
            column_type: ColumnType::Text,
            nullable: false,
        }
    }

    const fn optional_text(name: &'static str) -> Self {
        Self {
            name,
            column_type: ColumnType::Text,
            nullable: true,
        }
    }
}

const PATRON_TYPE_COLUMNS: &[Column] = &[Column::text("code"), Column::text("description")];

const LIBRARY_COLUMNS: &[Column] = &[Column::text("code"), Column::text("name")];

const NOTIFICATION_TYPE_COLUMNS: &[Column] =
    &[Column::text("code"), Column::text("description")];

const PATRON_COLUMNS: &[Column] = &[
    Column::text("patron_type_code"),
    Column::text("patron_type_description"),
    Column::text("checkout_total"),
    Column::text("renewal_total"),
    Column::text("age_range"),
    Column::text("home_library_code"),
    Column::text("home_library_name"),
    Column {
        name: "active_month",
        column_type: ColumnType::Integer,
        nullable: true,
    },
    Column::optional_text("active_year"),
    Column::text("notification_type_code"),
    Column::text("notification_type_description"),
    Column::optional_text("email"),
    Column {
        name: "within_sf_county",
        column_type: ColumnType::Bool,
        nullable: false,
    },
    Column::optional_text("year_registered"),
];

/// Secondary lookup indexes on the patrons collection
pub const PATRON_LOOKUP_FIELDS: &[&str] = &[
    "patron_type_code",
    "age_range",
    "home_library_code",
    "within_sf_county",
    "active_year",
    "email",
];

/// The four collections a reload manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    PatronTypes,
    Libraries,
    NotificationTypes,
    Patrons,
}

impl Collection {
    /// Creation order: references before the records that point at them
    pub const ALL: [Collection; 4] = [
        Collection::PatronTypes,
        Collection::Libraries,
        Collection::NotificationTypes,
        Collection::Patrons,
    ];

    /// Reference collections only
    pub const REFERENCES: [Collection; 3] = [
        Collection::PatronTypes,
        Collection::Libraries,
        Collection::NotificationTypes,
    ];

    /// Drop order, the reverse of [`Collection::ALL`]
    pub fn drop_order() -> impl Iterator<Item = Collection> {
        Self::ALL.into_iter().rev()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Collection::PatronTypes => "patron_types",
            Collection::Libraries => "libraries",
            Collection::NotificationTypes => "notification_types",
            Collection::Patrons => "patrons",
        }
    }

    /// Resolve a shell selector to a collection
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn columns(&self) -> &'static [Column] {
        match self {
            Collection::PatronTypes => PATRON_TYPE_COLUMNS,
            Collection::Libraries => LIBRARY_COLUMNS,
            Collection::NotificationTypes => NOTIFICATION_TYPE_COLUMNS,
            Collection::Patrons => PATRON_COLUMNS,
        }
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// Name of the reference label column ("description" or "name")
    pub fn label_field(&self) -> Option<&'static str> {
        match self {
            Collection::PatronTypes | Collection::NotificationTypes => Some("description"),
            Collection::Libraries => Some("name"),
            Collection::Patrons => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
