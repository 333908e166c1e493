// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers of users, teams and folders.
//!
//! Both identifiers are 16 bytes long. The last byte is a suffix encoding the kind of identity
//! (for [`UserOrTeamId`]) or the type of the folder (for [`TlfId`]), which makes it possible to
//! tell them apart without asking an identity service.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::serde::{deserialize_hex, serialize_hex};
use crate::types::TlfType;

/// Size of user, team and folder identifiers.
pub const ID_LEN: usize = 16;

const USER_SUFFIX: u8 = 0x19;
const PUBLIC_USER_SUFFIX: u8 = 0x00;
const TEAM_SUFFIX: u8 = 0x24;
const SUBTEAM_SUFFIX: u8 = 0x25;
const PUBLIC_TEAM_SUFFIX: u8 = 0x2e;
const PUBLIC_SUBTEAM_SUFFIX: u8 = 0x2f;

const PRIVATE_TLF_SUFFIX: u8 = 0x16;
const PUBLIC_TLF_SUFFIX: u8 = 0x17;
const SINGLE_TEAM_TLF_SUFFIX: u8 = 0x26;

/// Placeholder reader standing for "everyone" in public folders.
pub const PUBLIC_UID: UserOrTeamId = UserOrTeamId([
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    PUBLIC_USER_SUFFIX,
]);

/// Name of the public placeholder reader. It can never be resolved as an assertion.
pub const PUBLIC_UID_NAME: &str = "_public";

/// Identifier of a user, a team or a subteam.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserOrTeamId([u8; ID_LEN]);

impl UserOrTeamId {
    /// Create an identifier from its raw bytes, checking the kind suffix.
    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Result<Self, IdError> {
        match bytes[ID_LEN - 1] {
            USER_SUFFIX | PUBLIC_USER_SUFFIX | TEAM_SUFFIX | SUBTEAM_SUFFIX
            | PUBLIC_TEAM_SUFFIX | PUBLIC_SUBTEAM_SUFFIX => Ok(Self(bytes)),
            suffix => Err(IdError::InvalidIdentitySuffix(suffix)),
        }
    }

    /// Create a user identifier from the first 15 bytes.
    pub fn user(prefix: [u8; ID_LEN - 1]) -> Self {
        Self(with_suffix(prefix, USER_SUFFIX))
    }

    /// Create a team identifier from the first 15 bytes.
    ///
    /// Public teams back implicit public folders.
    pub fn team(prefix: [u8; ID_LEN - 1], public: bool) -> Self {
        let suffix = if public { PUBLIC_TEAM_SUFFIX } else { TEAM_SUFFIX };
        Self(with_suffix(prefix, suffix))
    }

    /// Create a subteam identifier from the first 15 bytes.
    pub fn subteam(prefix: [u8; ID_LEN - 1], public: bool) -> Self {
        let suffix = if public {
            PUBLIC_SUBTEAM_SUFFIX
        } else {
            SUBTEAM_SUFFIX
        };
        Self(with_suffix(prefix, suffix))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns true if this identifies a user (including the public placeholder).
    pub fn is_user(&self) -> bool {
        matches!(self.suffix(), USER_SUFFIX | PUBLIC_USER_SUFFIX)
    }

    /// Returns true if this identifies a team or a subteam.
    pub fn is_team_or_subteam(&self) -> bool {
        !self.is_user()
    }

    pub fn is_subteam(&self) -> bool {
        matches!(self.suffix(), SUBTEAM_SUFFIX | PUBLIC_SUBTEAM_SUFFIX)
    }

    pub fn is_public_team(&self) -> bool {
        matches!(self.suffix(), PUBLIC_TEAM_SUFFIX | PUBLIC_SUBTEAM_SUFFIX)
    }

    fn suffix(&self) -> u8 {
        self.0[ID_LEN - 1]
    }
}

impl AsRef<[u8]> for UserOrTeamId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for UserOrTeamId {
    type Error = IdError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let value_len = value.len();

        let checked_value: [u8; ID_LEN] = value
            .try_into()
            .map_err(|_| IdError::InvalidLength(value_len, ID_LEN))?;

        Self::from_bytes(checked_value)
    }
}

impl FromStr for UserOrTeamId {
    type Err = IdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl fmt::Display for UserOrTeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for UserOrTeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserOrTeamId").field(&self.to_hex()).finish()
    }
}

impl Serialize for UserOrTeamId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for UserOrTeamId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;

        bytes
            .as_slice()
            .try_into()
            .map_err(|err: IdError| serde::de::Error::custom(err.to_string()))
    }
}

/// Identifier of the storage backing a top-level folder.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TlfId([u8; ID_LEN]);

impl TlfId {
    /// Create a folder identifier from its raw bytes, checking the type suffix.
    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Result<Self, IdError> {
        match bytes[ID_LEN - 1] {
            PRIVATE_TLF_SUFFIX | PUBLIC_TLF_SUFFIX | SINGLE_TEAM_TLF_SUFFIX => Ok(Self(bytes)),
            suffix => Err(IdError::InvalidTlfSuffix(suffix)),
        }
    }

    /// Create a folder identifier of the given type from the first 15 bytes.
    pub fn new(prefix: [u8; ID_LEN - 1], tlf_type: TlfType) -> Self {
        let suffix = match tlf_type {
            TlfType::Private => PRIVATE_TLF_SUFFIX,
            TlfType::Public => PUBLIC_TLF_SUFFIX,
            TlfType::SingleTeam => SINGLE_TEAM_TLF_SUFFIX,
        };
        Self(with_suffix(prefix, suffix))
    }

    /// Type of the folder this identifier belongs to.
    pub fn tlf_type(&self) -> TlfType {
        match self.0[ID_LEN - 1] {
            PUBLIC_TLF_SUFFIX => TlfType::Public,
            SINGLE_TEAM_TLF_SUFFIX => TlfType::SingleTeam,
            _ => TlfType::Private,
        }
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for TlfId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for TlfId {
    type Error = IdError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let value_len = value.len();

        let checked_value: [u8; ID_LEN] = value
            .try_into()
            .map_err(|_| IdError::InvalidLength(value_len, ID_LEN))?;

        Self::from_bytes(checked_value)
    }
}

impl FromStr for TlfId {
    type Err = IdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl fmt::Display for TlfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TlfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TlfId").field(&self.to_hex()).finish()
    }
}

impl Serialize for TlfId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for TlfId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;

        bytes
            .as_slice()
            .try_into()
            .map_err(|err: IdError| serde::de::Error::custom(err.to_string()))
    }
}

fn with_suffix(prefix: [u8; ID_LEN - 1], suffix: u8) -> [u8; ID_LEN] {
    let mut bytes = [0; ID_LEN];
    bytes[..ID_LEN - 1].copy_from_slice(&prefix);
    bytes[ID_LEN - 1] = suffix;
    bytes
}

/// Error types for identifiers.
#[derive(Error, Debug)]
pub enum IdError {
    /// Identifier has an invalid length.
    #[error("invalid id length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    /// Identifier string contains invalid hexadecimal characters.
    #[error("invalid hex encoding in id string")]
    InvalidHexEncoding(#[from] hex::FromHexError),

    #[error("invalid user or team id suffix {0:#04x}")]
    InvalidIdentitySuffix(u8),

    #[error("invalid folder id suffix {0:#04x}")]
    InvalidTlfSuffix(u8),
}
