// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of a top-level folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlfType {
    /// Encrypted folder with writers and (optionally) readers.
    Private,

    /// Folder readable by everyone, writable by its writers.
    Public,

    /// Folder owned by exactly one named team.
    SingleTeam,
}

impl TlfType {
    /// Path segment used in canonical folder paths.
    pub fn path_segment(&self) -> &'static str {
        match self {
            TlfType::Private => "private",
            TlfType::Public => "public",
            TlfType::SingleTeam => "team",
        }
    }

    /// Keying type used when the folder is not backed by a team.
    pub fn to_keying_type(self) -> KeyingType {
        match self {
            TlfType::Private => KeyingType::Private,
            TlfType::Public => KeyingType::Public,
            TlfType::SingleTeam => KeyingType::Team,
        }
    }
}

impl fmt::Display for TlfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}

/// How the keys of a folder are managed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyingType {
    /// Per-device keys of the writers and readers.
    Private,

    /// No encryption.
    Public,

    /// Keys of the team backing the folder.
    Team,
}
