// SPDX-License-Identifier: MIT OR Apache-2.0

//! Social assertions and identity assertion expressions.
//!
//! An assertion is a way of naming an identity through a proof on another service, for
//! example `alice@twitter` or `github:alice`. Assertions which can't (yet) be resolved to a
//! user stay in folder names as "unresolved" social assertions.
//!
//! Multiple assertions can be combined with `+` into an AND expression, for example
//! `alice+alice@twitter`, which only resolves if all parts point at the same identity.
use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::UserOrTeamId;
use crate::username::is_valid_username;

/// Prefix turning a bare name into a team assertion.
pub const TEAM_ASSERTION_PREFIX: &str = "team:";

/// Separator of AND assertion expressions.
pub const AND_SEPARATOR: char = '+';

const KEYBASE_SERVICE: &str = "keybase";
const UID_SERVICE: &str = "uid";
const TEAM_SERVICE: &str = "team";

struct SocialService {
    name: &'static str,
    user_regex: &'static str,
    case_sensitive: bool,
}

const SOCIAL_SERVICES: &[SocialService] = &[
    SocialService {
        name: "twitter",
        user_regex: r"^[a-zA-Z0-9_]{1,20}$",
        case_sensitive: false,
    },
    SocialService {
        name: "github",
        user_regex: r"^[a-zA-Z0-9][a-zA-Z0-9-]{0,38}$",
        case_sensitive: false,
    },
    SocialService {
        name: "reddit",
        user_regex: r"^[-_a-zA-Z0-9]{3,20}$",
        case_sensitive: false,
    },
    SocialService {
        name: "hackernews",
        user_regex: r"^[a-zA-Z0-9_-]{2,15}$",
        case_sensitive: true,
    },
    SocialService {
        name: "facebook",
        user_regex: r"^[a-zA-Z0-9.]{1,50}$",
        case_sensitive: false,
    },
];

static SOCIAL_USER_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    SOCIAL_SERVICES
        .iter()
        // Unwrap as we checked the regular expressions for correctness
        .map(|service| Regex::new(service.user_regex).unwrap())
        .collect()
});

static TEAM_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Unwrap as we checked the regular expression for correctness
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_]*(\.[a-zA-Z0-9][a-zA-Z0-9_]*)*$").unwrap()
});

/// Identity proven on an external service, written as `user@service`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SocialAssertion {
    user: String,
    service: String,
}

impl SocialAssertion {
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

impl fmt::Display for SocialAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.service)
    }
}

// Folder names sort assertions by their string form, so ordering has to follow it as well.
impl PartialOrd for SocialAssertion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SocialAssertion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl Serialize for SocialAssertion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SocialAssertion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        normalize_social_assertion_static(&value).ok_or_else(|| {
            serde::de::Error::custom(AssertionError::NotSocial(value).to_string())
        })
    }
}

/// Normalizes a social assertion without asking any identity service.
///
/// Accepts both the `user@service` and the `service:user` form. Service names are always
/// lower-cased, user names only for services which treat them case-insensitively. Returns
/// `None` if the value is not a social assertion for a known service.
pub fn normalize_social_assertion_static(value: &str) -> Option<SocialAssertion> {
    let (user, service) = split_service(value)?;
    let service = service.to_lowercase();

    let index = SOCIAL_SERVICES.iter().position(|s| s.name == service)?;
    if !SOCIAL_USER_REGEXES[index].is_match(user) {
        return None;
    }

    let user = if SOCIAL_SERVICES[index].case_sensitive {
        user.to_string()
    } else {
        user.to_lowercase()
    };

    Some(SocialAssertion { user, service })
}

/// Single part of an assertion expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssertionUrl {
    /// Username on the identity service itself, written bare or as `keybase:name`.
    Keybase(String),

    /// Identifier of a user, written as `uid:ID` or `ID@uid`.
    Uid(UserOrTeamId),

    /// Name of a team, written as `team:name` or `name@team`.
    Team(String),

    /// Proof on an external service.
    Social(SocialAssertion),
}

impl AssertionUrl {
    /// Parses one part of an assertion expression.
    pub fn parse(value: &str) -> Result<Self, AssertionError> {
        if value.is_empty() {
            return Err(AssertionError::Empty);
        }

        let Some((user, service)) = split_service(value) else {
            return Self::parse_keybase(value);
        };

        match service.to_lowercase().as_str() {
            KEYBASE_SERVICE => Self::parse_keybase(user),
            UID_SERVICE => user
                .parse::<UserOrTeamId>()
                .ok()
                .filter(|id| id.is_user())
                .map(AssertionUrl::Uid)
                .ok_or_else(|| AssertionError::InvalidValue(value.to_string())),
            TEAM_SERVICE => {
                if TEAM_NAME_REGEX.is_match(user) {
                    Ok(AssertionUrl::Team(user.to_lowercase()))
                } else {
                    Err(AssertionError::InvalidValue(value.to_string()))
                }
            }
            service => {
                if !SOCIAL_SERVICES.iter().any(|s| s.name == service) {
                    return Err(AssertionError::UnknownService(service.to_string()));
                }
                normalize_social_assertion_static(value)
                    .map(AssertionUrl::Social)
                    .ok_or_else(|| AssertionError::InvalidValue(value.to_string()))
            }
        }
    }

    /// Returns true if this names a user of the identity service directly.
    pub fn is_keybase(&self) -> bool {
        matches!(self, AssertionUrl::Keybase(_))
    }

    fn parse_keybase(value: &str) -> Result<Self, AssertionError> {
        if is_valid_username(value) {
            Ok(AssertionUrl::Keybase(value.to_lowercase()))
        } else {
            Err(AssertionError::InvalidValue(value.to_string()))
        }
    }
}

/// Parses an AND expression (`a+b+c`) into its parts.
pub fn parse_assertion_expression(value: &str) -> Result<Vec<AssertionUrl>, AssertionError> {
    value.split(AND_SEPARATOR).map(AssertionUrl::parse).collect()
}

/// Splits `user@service` or `service:user` into user and service.
fn split_service(value: &str) -> Option<(&str, &str)> {
    if let Some((service, user)) = value.split_once(':') {
        return Some((user, service));
    }
    value.rsplit_once('@')
}

#[derive(Debug, Error)]
pub enum AssertionError {
    #[error("empty assertion")]
    Empty,

    #[error("unknown assertion service {0}")]
    UnknownService(String),

    #[error("invalid assertion value {0}")]
    InvalidValue(String),

    #[error("{0} is not a social assertion")]
    NotSocial(String),
}
