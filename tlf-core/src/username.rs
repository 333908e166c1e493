// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const USERNAME_MIN_LEN: usize = 2;
const USERNAME_MAX_LEN: usize = 16;

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Unwrap as we checked the regular expression for correctness
    Regex::new(r"^([a-zA-Z0-9][a-zA-Z0-9_]?)+$").unwrap()
});

/// Returns true if the string is a well-formed username, ignoring case.
pub fn is_valid_username(value: &str) -> bool {
    (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&value.len()) && USERNAME_REGEX.is_match(value)
}

/// Lower-cased name of a user or a team.
///
/// Team names can contain dots (subteams) and implicit team display names contain the full
/// writer and reader lists, so no further validation happens here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedUsername(String);

impl NormalizedUsername {
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedUsername {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NormalizedUsername {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for NormalizedUsername {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
