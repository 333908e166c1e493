// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting, normalizing and building folder names.
//!
//! Folder names follow the grammar `w1,w2[#r1,r2][ (ext) (ext)]`: a comma-separated list of
//! writers, optionally followed by `#` and a list of readers, optionally followed by a space
//! and the extension suffix.
//!
//! Everything in this module works offline. Whether the names in a folder name exist is
//! checked when resolving the name into a handle.
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assertion::{
    TEAM_ASSERTION_PREFIX, normalize_social_assertion_static, parse_assertion_expression,
};
use crate::extension::{EXTENSION_SEPARATOR, ExtensionError, HandleExtension, format_extensions};
use crate::types::TlfType;
use crate::username::{NormalizedUsername, is_valid_username};

/// Separator between the writer and reader lists.
pub const READER_SEPARATOR: &str = "#";

/// Separator between names within a list.
pub const NAME_SEPARATOR: &str = ",";

/// Root of canonical folder paths.
pub const PATH_PREFIX: &str = "/keybase";

/// Name of a folder in its canonical form: sorted, normalized lists and canonical extensions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CanonicalName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for CanonicalName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Name of a folder as presented to one particular user, with that user listed first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PreferredName(String);

impl PreferredName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreferredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writers, readers and extension suffix of a folder name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitName {
    pub writers: Vec<String>,
    pub readers: Vec<String>,
    pub extension_suffix: String,
}

/// Splits a folder name into its writers, readers and extension suffix.
///
/// No normalization takes place.
pub fn split_name(name: &str) -> Result<SplitName, NameError> {
    let (assertions, extension_suffix) = split_extension(name);

    let mut parts = assertions.splitn(3, READER_SEPARATOR);
    let writers = parts.next().unwrap_or_default();
    let readers = parts.next();
    if parts.next().is_some() {
        return Err(NameError::BadName(name.to_string()));
    }

    Ok(SplitName {
        writers: writers.split(NAME_SEPARATOR).map(str::to_string).collect(),
        readers: readers
            .map(|readers| readers.split(NAME_SEPARATOR).map(str::to_string).collect())
            .unwrap_or_default(),
        extension_suffix: extension_suffix.to_string(),
    })
}

/// Splits a folder name into the member lists and the extension suffix.
pub fn split_extension(name: &str) -> (&str, &str) {
    name.split_once(EXTENSION_SEPARATOR).unwrap_or((name, ""))
}

/// Splits a folder name and checks that it is normalized and valid for the folder type.
///
/// Names which only differ in the order of their members are accepted here. The returned
/// extension suffix is lower-cased.
pub fn split_and_normalize_tlf_name(name: &str, tlf_type: TlfType) -> Result<SplitName, NameError> {
    let mut split = split_name(name)?;

    if tlf_type == TlfType::SingleTeam && split.writers.len() != 1 {
        // Team folders must have exactly one writer, the team itself.
        return Err(NameError::NoSuchName(name.to_string()));
    }

    if tlf_type != TlfType::Private && !split.readers.is_empty() {
        return Err(NameError::NoSuchName(name.to_string()));
    }

    let (normalized, changed) =
        normalize_names_in_tlf(&split.writers, &split.readers, &split.extension_suffix, tlf_type)?;
    if changed {
        return Err(NameError::NotCanonical {
            name: name.to_string(),
            name_to_try: normalized,
        });
    }

    split.extension_suffix = split.extension_suffix.to_lowercase();
    Ok(split)
}

/// Checks a folder name without resolving any of its members.
pub fn check_handle_offline(name: &str, tlf_type: TlfType) -> Result<(), NameError> {
    split_and_normalize_tlf_name(name, tlf_type).map(|_| ())
}

/// Normalizes every member of a folder name and builds the normalized name.
///
/// Returns the name with sorted lists and whether any member changed by normalization.
pub fn normalize_names_in_tlf(
    writers: &[String],
    readers: &[String],
    extension_suffix: &str,
    tlf_type: TlfType,
) -> Result<(String, bool), NameError> {
    let mut changed = false;

    let mut normalize_list = |names: &[String]| -> Result<Vec<String>, NameError> {
        let mut normalized = names
            .iter()
            .map(|name| {
                let value = normalize_assertion_or_name(name, tlf_type)?;
                changed |= &value != name;
                Ok(value)
            })
            .collect::<Result<Vec<_>, NameError>>()?;
        normalized.sort();
        Ok(normalized)
    };

    let mut normalized_name = normalize_list(writers)?.join(NAME_SEPARATOR);

    if !readers.is_empty() {
        normalized_name.push_str(READER_SEPARATOR);
        normalized_name.push_str(&normalize_list(readers)?.join(NAME_SEPARATOR));
    }

    if !extension_suffix.is_empty() {
        let lowered = extension_suffix.to_lowercase();
        changed |= lowered != extension_suffix;
        normalized_name.push_str(EXTENSION_SEPARATOR);
        normalized_name.push_str(&lowered);
    }

    Ok((normalized_name, changed))
}

/// Normalizes a single member of a folder name.
///
/// Usernames are lower-cased, social assertions brought into `user@service` form and AND
/// expressions lower-cased. Team folders only accept team names.
pub fn normalize_assertion_or_name(value: &str, tlf_type: TlfType) -> Result<String, NameError> {
    if is_valid_username(value) {
        return Ok(NormalizedUsername::new(value).to_string());
    }

    if let Some(assertion) = normalize_social_assertion_static(value) {
        if tlf_type == TlfType::SingleTeam {
            return Err(NameError::SocialAssertionInTeam(value.to_string()));
        }
        return Ok(assertion.to_string());
    }

    let expression = if tlf_type == TlfType::SingleTeam {
        format!("{TEAM_ASSERTION_PREFIX}{value}")
    } else {
        value.to_string()
    };

    match parse_assertion_expression(&expression) {
        Ok(urls) => {
            // A single plain username which didn't pass the username check above can't exist.
            if urls.len() == 1 && urls[0].is_keybase() {
                return Err(NameError::NoSuchUser(value.to_string()));
            }
            Ok(value.to_lowercase())
        }
        Err(_) => Err(NameError::BadName(value.to_string())),
    }
}

/// Builds the canonical name from member names and extensions.
///
/// Team-backed folders always print extension numbers.
pub fn make_canonical_name(
    writers: impl IntoIterator<Item = String>,
    readers: impl IntoIterator<Item = String>,
    extensions: &[HandleExtension],
    is_backed_by_team: bool,
) -> CanonicalName {
    let mut writers: Vec<String> = writers.into_iter().collect();
    writers.sort();
    let mut name = writers.join(NAME_SEPARATOR);

    let mut readers: Vec<String> = readers.into_iter().collect();
    if !readers.is_empty() {
        readers.sort();
        name.push_str(READER_SEPARATOR);
        name.push_str(&readers.join(NAME_SEPARATOR));
    }

    if !extensions.is_empty() {
        name.push_str(EXTENSION_SEPARATOR);
        name.push_str(&format_extensions(extensions, is_backed_by_team));
    }

    CanonicalName(name)
}

/// Moves the given user to the front of the writer list.
///
/// Without a user the canonical name is returned unchanged.
pub fn canonical_to_preferred_name(
    username: Option<&NormalizedUsername>,
    canonical: &CanonicalName,
) -> Result<PreferredName, NameError> {
    let Some(username) = username.filter(|username| !username.is_empty()) else {
        return Ok(PreferredName(canonical.0.clone()));
    };

    let split = split_name(canonical.as_str())?;
    if split.writers.iter().all(|writer| writer.is_empty()) {
        return Err(NameError::NoWriters(canonical.to_string()));
    }

    let Some(index) = split
        .writers
        .iter()
        .position(|writer| writer == username.as_str())
    else {
        return Ok(PreferredName(canonical.0.clone()));
    };

    let mut writers = split.writers;
    let writer = writers.remove(index);
    writers.insert(0, writer);

    let mut name = writers.join(NAME_SEPARATOR);
    if !split.readers.is_empty() {
        name.push_str(READER_SEPARATOR);
        name.push_str(&split.readers.join(NAME_SEPARATOR));
    }
    if !split.extension_suffix.is_empty() {
        name.push_str(EXTENSION_SEPARATOR);
        name.push_str(&split.extension_suffix);
    }

    Ok(PreferredName(name))
}

/// Builds the path of a folder, for example `/keybase/private/alice,bob`.
pub fn build_canonical_path(tlf_type: TlfType, name: &str) -> String {
    format!("{PATH_PREFIX}/{}/{name}", tlf_type.path_segment())
}

#[derive(Debug, Error)]
pub enum NameError {
    /// The name is valid but not in its normalized form.
    #[error("{name} is not the canonical name for this folder, try {name_to_try}")]
    NotCanonical { name: String, name_to_try: String },

    #[error("{0} is not a valid folder name")]
    NoSuchName(String),

    #[error("{0} is not a valid username")]
    NoSuchUser(String),

    #[error("{0} is not a valid name or assertion")]
    BadName(String),

    #[error("social assertion {0} is not allowed in a team folder name")]
    SocialAssertionInTeam(String),

    #[error("folder name {0} has no writers")]
    NoWriters(String),

    #[error(transparent)]
    Extension(#[from] ExtensionError),
}
