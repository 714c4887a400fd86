//! Local user records and the row normalizer
//!
//! A CSV row is an arbitrary string-keyed mapping. The normalizer maps it onto
//! the fixed [`LocalUserRecord`] shape and checks that every attribute needed to
//! create the user in the directory is present.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A raw CSV row keyed by header name
pub type CsvRow = HashMap<String, String>;

/// Column carrying the given (first) name
pub const GIVEN_NAME: &str = "givenName";
/// Column carrying the family (last) name
pub const FAMILY_NAME: &str = "familyName";
/// Column carrying the display name
pub const DISPLAY_NAME: &str = "displayName";
/// Column carrying the email, which is also the directory userName
pub const EMAIL: &str = "email";

/// Required columns, in the order they are checked
pub const REQUIRED_FIELDS: [&str; 4] = [GIVEN_NAME, FAMILY_NAME, DISPLAY_NAME, EMAIL];

/// A user described by one CSV row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUserRecord {
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,
    pub email: String,
    /// Directory identifier, only set after the directory created the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl LocalUserRecord {
    /// Build a record from a row without validating it.
    ///
    /// Missing columns become empty strings and extra columns are ignored, so
    /// every row has a matching key even when it is not eligible for creation.
    pub fn from_row(row: &CsvRow) -> Self {
        let field = |name: &str| row.get(name).cloned().unwrap_or_default();
        Self {
            given_name: field(GIVEN_NAME),
            family_name: field(FAMILY_NAME),
            display_name: field(DISPLAY_NAME),
            email: field(EMAIL),
            id: None,
        }
    }

    /// Lower-cased email used to match against the directory userName
    pub fn match_key(&self) -> String {
        self.email.to_lowercase()
    }

    /// Check that all required attributes are non-blank
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.missing_fields().first() {
            Some(field) => Err(ValidationError {
                field: field.to_string(),
                record: self.clone(),
            }),
            None => Ok(()),
        }
    }

    fn value(&self, field: &str) -> &str {
        match field {
            GIVEN_NAME => &self.given_name,
            FAMILY_NAME => &self.family_name,
            DISPLAY_NAME => &self.display_name,
            EMAIL => &self.email,
            _ => "",
        }
    }

    /// Names of every required field that is blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| self.value(field).trim().is_empty())
            .collect()
    }
}

impl fmt::Display for LocalUserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{givenName: {:?}, familyName: {:?}, displayName: {:?}, email: {:?}}}",
            self.given_name, self.family_name, self.display_name, self.email
        )
    }
}

/// A row is missing a required attribute
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing required field '{field}' in record {record}")]
pub struct ValidationError {
    /// First blank field, in [`REQUIRED_FIELDS`] order
    pub field: String,
    /// The offending record in full
    pub record: LocalUserRecord,
}

/// Map a raw row onto a validated [`LocalUserRecord`]
pub fn normalize(row: &CsvRow) -> Result<LocalUserRecord, ValidationError> {
    let record = LocalUserRecord::from_row(row);
    record.validate()?;
    Ok(record)
}
