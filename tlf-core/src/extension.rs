// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extensions appended to folder names.
//!
//! A folder name can end with up to two extensions, separated by spaces:
//!
//! ```text
//! alice,bob (conflicted copy 2016-03-14 #3) (files before bob account reset 2016-03-14 #2)
//! ```
//!
//! Conflict extensions mark a branch which could not be merged with the main history (either
//! on the server or only locally), finalized extensions mark a folder which got frozen after
//! one of its members reset their account. Conflict extensions always come first.
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::username::NormalizedUsername;

/// Separator between the member lists of a folder name and its extensions.
pub const EXTENSION_SEPARATOR: &str = " ";

const DATE_FORMAT: &str = "%Y-%m-%d";
const LOCAL_CONFLICT_PREFIX: &str = "(local conflicted copy";

static EXTENSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Unwrap as we checked the regular expression for correctness
    Regex::new(
        r"^\((?:(local conflicted copy)|(conflicted copy)|files before (?:([a-z0-9_]+) )?account reset) (\d{4}-\d{2}-\d{2})(?: #(\d+))?\)$",
    )
    .unwrap()
});

/// Kind of a folder name extension.
///
/// The declaration order is the order in which extensions appear in folder names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleExtensionType {
    /// Branch which conflicted with the server history.
    Conflict,

    /// Branch which conflicted with local, not yet flushed history.
    LocalConflict,

    /// Frozen copy of the folder from before an account reset.
    Finalized,
}

impl HandleExtensionType {
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            HandleExtensionType::Conflict | HandleExtensionType::LocalConflict
        )
    }
}

/// Extension of a folder name, marking conflicted or finalized copies.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleExtension {
    /// Start of the UTC day the extension was created on, in seconds since the Unix epoch.
    date: i64,

    /// Number distinguishing several extensions created on the same day, starting with 1.
    number: u16,

    #[serde(rename = "type")]
    ext_type: HandleExtensionType,

    /// Name of the user whose account reset finalized the folder.
    username: Option<NormalizedUsername>,
}

impl HandleExtension {
    /// Create an extension dated to the UTC day of `now`.
    pub fn new(
        ext_type: HandleExtensionType,
        number: u16,
        username: Option<NormalizedUsername>,
        now: DateTime<Utc>,
    ) -> Result<Self, ExtensionError> {
        if number == 0 {
            return Err(ExtensionError::InvalidNumber(number));
        }

        let date = now.date_naive().and_time(NaiveTime::MIN).and_utc().timestamp();

        Ok(Self {
            date,
            number,
            ext_type,
            username: username.filter(|name| !name.is_empty()),
        })
    }

    pub fn ext_type(&self) -> HandleExtensionType {
        self.ext_type
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    /// Seconds since the Unix epoch of the day this extension was created.
    pub fn date(&self) -> i64 {
        self.date
    }

    pub fn username(&self) -> Option<&NormalizedUsername> {
        self.username.as_ref()
    }

    /// Formats the extension for a folder name.
    ///
    /// Folders backed by teams always print the extension number, user folders only when it is
    /// larger than one.
    pub fn format(&self, is_backed_by_team: bool) -> String {
        let date = DateTime::<Utc>::from_timestamp(self.date, 0)
            .map(|date| date.format(DATE_FORMAT).to_string())
            .unwrap_or_default();

        let number = if is_backed_by_team || self.number > 1 {
            format!(" #{}", self.number)
        } else {
            String::new()
        };

        match self.ext_type {
            HandleExtensionType::Conflict => format!("(conflicted copy {date}{number})"),
            HandleExtensionType::LocalConflict => {
                format!("(local conflicted copy {date}{number})")
            }
            HandleExtensionType::Finalized => match &self.username {
                Some(username) => {
                    format!("(files before {username} account reset {date}{number})")
                }
                None => format!("(files before account reset {date}{number})"),
            },
        }
    }

    fn parse(value: &str) -> Result<Self, ExtensionError> {
        let captures = EXTENSION_REGEX
            .captures(value)
            .ok_or_else(|| ExtensionError::InvalidExtension(value.to_string()))?;

        let ext_type = if captures.get(1).is_some() {
            HandleExtensionType::LocalConflict
        } else if captures.get(2).is_some() {
            HandleExtensionType::Conflict
        } else {
            HandleExtensionType::Finalized
        };

        let username = captures
            .get(3)
            .map(|username| NormalizedUsername::new(username.as_str()));

        // The regular expression guarantees the date group is present
        let date = captures.get(4).map(|m| m.as_str()).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|_| ExtensionError::InvalidDate(date.to_string()))?;

        let number = match captures.get(5) {
            Some(number) => number
                .as_str()
                .parse::<u16>()
                .map_err(|_| ExtensionError::InvalidExtension(value.to_string()))?,
            None => 1,
        };

        Self::new(ext_type, number, username, date.and_time(NaiveTime::MIN).and_utc())
    }
}

impl fmt::Display for HandleExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Parses the extension part of a folder name (everything after the first space).
pub fn parse_extension_suffix(suffix: &str) -> Result<Vec<HandleExtension>, ExtensionError> {
    let mut extensions = Vec::new();
    let mut rest = suffix;

    while !rest.is_empty() {
        let end = rest
            .find(')')
            .ok_or_else(|| ExtensionError::InvalidExtension(rest.to_string()))?;
        extensions.push(HandleExtension::parse(&rest[..=end])?);

        rest = &rest[end + 1..];
        if let Some(next) = rest.strip_prefix(EXTENSION_SEPARATOR) {
            if next.is_empty() {
                return Err(ExtensionError::InvalidExtension(suffix.to_string()));
            }
            rest = next;
        } else if !rest.is_empty() {
            return Err(ExtensionError::InvalidExtension(suffix.to_string()));
        }
    }

    Ok(extensions)
}

/// Formats a list of extensions the way they appear in a folder name.
pub fn format_extensions(extensions: &[HandleExtension], is_backed_by_team: bool) -> String {
    extensions
        .iter()
        .map(|extension| extension.format(is_backed_by_team))
        .collect::<Vec<_>>()
        .join(EXTENSION_SEPARATOR)
}

/// Sorts extensions into name order and splits them into conflict and finalized info.
pub fn sort_and_splat_extensions(
    mut extensions: Vec<HandleExtension>,
) -> Result<(Option<HandleExtension>, Option<HandleExtension>), ExtensionError> {
    extensions.sort_by_key(|extension| extension.ext_type);

    let mut conflict_info = None;
    let mut finalized_info = None;
    for extension in extensions {
        let slot = if extension.ext_type.is_conflict() {
            &mut conflict_info
        } else {
            &mut finalized_info
        };
        if slot.is_some() {
            return Err(ExtensionError::Duplicate(extension.ext_type));
        }
        *slot = Some(extension);
    }

    Ok((conflict_info, finalized_info))
}

/// Returns true if the name carries a local conflict extension.
pub fn contains_local_conflict_prefix(name: &str) -> bool {
    name.contains(LOCAL_CONFLICT_PREFIX)
}

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("invalid folder name extension {0}")]
    InvalidExtension(String),

    #[error("invalid date {0} in folder name extension")]
    InvalidDate(String),

    #[error("extension number {0} is invalid, numbers start at 1")]
    InvalidNumber(u16),

    #[error("more than one {0:?} extension")]
    Duplicate(HandleExtensionType),
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::username::NormalizedUsername;

    use super::{
        ExtensionError, HandleExtension, HandleExtensionType, contains_local_conflict_prefix,
        format_extensions, parse_extension_suffix, sort_and_splat_extensions,
    };

    fn march_14() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 3, 14, 15, 26, 53).unwrap()
    }

    #[test]
    fn formatting() {
        let conflict =
            HandleExtension::new(HandleExtensionType::Conflict, 1, None, march_14()).unwrap();
        assert_eq!(conflict.to_string(), "(conflicted copy 2016-03-14)");
        assert_eq!(conflict.format(true), "(conflicted copy 2016-03-14 #1)");

        let finalized = HandleExtension::new(
            HandleExtensionType::Finalized,
            2,
            Some(NormalizedUsername::new("u2")),
            march_14(),
        )
        .unwrap();
        assert_eq!(
            finalized.to_string(),
            "(files before u2 account reset 2016-03-14 #2)"
        );

        let local =
            HandleExtension::new(HandleExtensionType::LocalConflict, 3, None, march_14()).unwrap();
        assert_eq!(local.to_string(), "(local conflicted copy 2016-03-14 #3)");

        let anonymous =
            HandleExtension::new(HandleExtensionType::Finalized, 1, None, march_14()).unwrap();
        assert_eq!(
            anonymous.to_string(),
            "(files before account reset 2016-03-14)"
        );
    }

    #[test]
    fn dates_are_truncated_to_days() {
        let extension =
            HandleExtension::new(HandleExtensionType::Conflict, 1, None, march_14()).unwrap();
        assert_eq!(extension.date() % 86_400, 0);
    }

    #[test]
    fn numbers_start_at_one() {
        assert!(matches!(
            HandleExtension::new(HandleExtensionType::Conflict, 0, None, march_14()),
            Err(ExtensionError::InvalidNumber(0))
        ));
        assert!(parse_extension_suffix("(conflicted copy 2016-03-14 #0)").is_err());
    }

    #[test]
    fn parse_suffix() {
        let suffix = "(conflicted copy 2016-03-14 #3) (files before u2 account reset 2016-03-14 #2)";
        let extensions = parse_extension_suffix(suffix).unwrap();
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[0].ext_type(), HandleExtensionType::Conflict);
        assert_eq!(extensions[0].number(), 3);
        assert_eq!(extensions[1].ext_type(), HandleExtensionType::Finalized);
        assert_eq!(extensions[1].username().unwrap().as_str(), "u2");
        assert_eq!(format_extensions(&extensions, false), suffix);

        let extensions = parse_extension_suffix("(conflicted copy 2016-03-14 #1)").unwrap();
        assert_eq!(extensions[0].number(), 1);
        assert_eq!(
            format_extensions(&extensions, false),
            "(conflicted copy 2016-03-14)"
        );

        assert!(parse_extension_suffix("").unwrap().is_empty());
    }

    #[test]
    fn invalid_suffixes() {
        for suffix in [
            "(conflicted copy)",
            "(conflicted copy 2016-03-14",
            "(conflicted copy 2016-03-14) ",
            "(conflicted copy 2016-03-14)(conflicted copy 2016-03-15)",
            "(conflicted copy 2016-13-14)",
            "(deleted copy 2016-03-14)",
        ] {
            assert!(parse_extension_suffix(suffix).is_err(), "{suffix}");
        }
    }

    #[test]
    fn splat() {
        let extensions = parse_extension_suffix(
            "(files before account reset 2016-03-14) (local conflicted copy 2016-03-14 #2)",
        )
        .unwrap();
        let (conflict, finalized) = sort_and_splat_extensions(extensions).unwrap();
        assert_eq!(
            conflict.unwrap().ext_type(),
            HandleExtensionType::LocalConflict
        );
        assert!(finalized.is_some());

        let extensions = parse_extension_suffix(
            "(conflicted copy 2016-03-14) (conflicted copy 2016-03-15)",
        )
        .unwrap();
        assert!(matches!(
            sort_and_splat_extensions(extensions),
            Err(ExtensionError::Duplicate(HandleExtensionType::Conflict))
        ));

        assert!(contains_local_conflict_prefix(
            "alice (local conflicted copy 2016-03-14 #2)"
        ));
        assert!(!contains_local_conflict_prefix(
            "alice (conflicted copy 2016-03-14 #2)"
        ));
    }
}
