// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved, canonical description of a top-level folder.
use std::collections::{BTreeMap, BTreeSet};

use tlf_core::extension::EXTENSION_SEPARATOR;
use tlf_core::{
    BareHandle, CanonicalName, HandleExtension, HandleExtensionType, KeyingType,
    NormalizedUsername, PUBLIC_UID, PreferredName, SocialAssertion, TlfId, TlfType,
    UserOrTeamId, build_canonical_path, canonical_to_preferred_name, format_extensions,
};

use crate::errors::{HandleError, InternalError};

/// Members, extensions and canonical name of a folder.
///
/// Handles are values: operations which change a handle return a new one. Resolved members
/// are kept sorted by id, unresolved ones sorted by their string form. Writers never show up
/// as readers, unresolved writers never as unresolved readers.
///
/// Two handles are equal if all of their parts including the canonical name are equal, use
/// [`Handle::equals_ignore_name`] to compare everything but the name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handle {
    tlf_type: TlfType,
    resolved_writers: BTreeMap<UserOrTeamId, NormalizedUsername>,
    resolved_readers: BTreeMap<UserOrTeamId, NormalizedUsername>,
    unresolved_writers: Vec<SocialAssertion>,
    unresolved_readers: Vec<SocialAssertion>,
    conflict_info: Option<HandleExtension>,
    finalized_info: Option<HandleExtension>,
    name: CanonicalName,
    tlf_id: Option<TlfId>,
}

/// Member lists of a handle, as produced by resolution.
#[derive(Clone, Debug, Default)]
pub(crate) struct Members {
    pub resolved_writers: BTreeMap<UserOrTeamId, NormalizedUsername>,
    pub resolved_readers: BTreeMap<UserOrTeamId, NormalizedUsername>,
    pub unresolved_writers: Vec<SocialAssertion>,
    pub unresolved_readers: Vec<SocialAssertion>,
}

impl Handle {
    pub(crate) fn new(
        tlf_type: TlfType,
        members: Members,
        conflict_info: Option<HandleExtension>,
        finalized_info: Option<HandleExtension>,
        name: CanonicalName,
        tlf_id: Option<TlfId>,
    ) -> Self {
        Self {
            tlf_type,
            resolved_writers: members.resolved_writers,
            resolved_readers: members.resolved_readers,
            unresolved_writers: members.unresolved_writers,
            unresolved_readers: members.unresolved_readers,
            conflict_info,
            finalized_info,
            name,
            tlf_id,
        }
    }

    pub fn tlf_type(&self) -> TlfType {
        self.tlf_type
    }

    pub fn tlf_id(&self) -> Option<TlfId> {
        self.tlf_id
    }

    pub fn set_tlf_id(&mut self, tlf_id: Option<TlfId>) {
        self.tlf_id = tlf_id;
    }

    /// Returns true if the folder is backed by a single team which is its only member.
    pub fn is_backed_by_team(&self) -> bool {
        self.resolved_writers.len() == 1
            && self.resolved_readers.is_empty()
            && self.unresolved_writers.is_empty()
            && self.unresolved_readers.is_empty()
            && self
                .resolved_writers
                .keys()
                .all(|id| id.is_team_or_subteam())
    }

    pub fn type_for_keying(&self) -> KeyingType {
        if self.is_backed_by_team() {
            KeyingType::Team
        } else {
            self.tlf_type.to_keying_type()
        }
    }

    pub fn is_writer(&self, user: UserOrTeamId) -> Result<bool, HandleError> {
        if self.type_for_keying() == KeyingType::Team {
            return Err(InternalError::TeamKeyedAccessCheck.into());
        }
        Ok(self.resolved_writers.contains_key(&user))
    }

    /// Public folders can be read by everyone.
    pub fn is_reader(&self, user: UserOrTeamId) -> Result<bool, HandleError> {
        if self.type_for_keying() == KeyingType::Public {
            return Ok(true);
        }
        Ok(self.is_writer(user)? || self.resolved_readers.contains_key(&user))
    }

    pub fn check_read_access(
        &self,
        user: UserOrTeamId,
        username: &NormalizedUsername,
    ) -> Result<(), HandleError> {
        if self.is_reader(user)? {
            return Ok(());
        }
        Err(HandleError::ReadAccess {
            user: username.clone(),
            name: self.name.clone(),
            tlf_type: self.tlf_type,
            path: self.canonical_path(),
        })
    }

    pub fn check_write_access(
        &self,
        user: UserOrTeamId,
        username: &NormalizedUsername,
    ) -> Result<(), HandleError> {
        if self.is_writer(user)? {
            return Ok(());
        }
        Err(HandleError::WriteAccess {
            user: username.clone(),
            name: self.name.clone(),
            tlf_type: self.tlf_type,
            path: self.canonical_path(),
        })
    }

    /// Ids of all resolved writers, sorted.
    pub fn resolved_writers(&self) -> Vec<UserOrTeamId> {
        self.resolved_writers.keys().copied().collect()
    }

    pub fn first_resolved_writer(&self) -> Option<UserOrTeamId> {
        self.resolved_writers.keys().next().copied()
    }

    /// Ids of all resolved readers, sorted.
    pub fn resolved_readers(&self) -> Vec<UserOrTeamId> {
        self.resolved_readers.keys().copied().collect()
    }

    /// Names of all resolved writers and readers.
    pub fn resolved_users_map(&self) -> BTreeMap<UserOrTeamId, NormalizedUsername> {
        self.resolved_writers
            .iter()
            .chain(self.resolved_readers.iter())
            .map(|(id, name)| (*id, name.clone()))
            .collect()
    }

    pub fn unresolved_writers(&self) -> &[SocialAssertion] {
        &self.unresolved_writers
    }

    pub fn unresolved_readers(&self) -> &[SocialAssertion] {
        &self.unresolved_readers
    }

    pub fn has_unresolved(&self) -> bool {
        !self.unresolved_writers.is_empty() || !self.unresolved_readers.is_empty()
    }

    /// String forms of all unresolved writers and readers.
    pub fn unresolved_assertions(&self) -> BTreeSet<String> {
        self.unresolved_writers
            .iter()
            .chain(self.unresolved_readers.iter())
            .map(|assertion| assertion.to_string())
            .collect()
    }

    pub fn conflict_info(&self) -> Option<&HandleExtension> {
        self.conflict_info.as_ref()
    }

    pub fn finalized_info(&self) -> Option<&HandleExtension> {
        self.finalized_info.as_ref()
    }

    /// Conflict and finalized info, in the order they appear in the name.
    pub fn extensions(&self) -> Vec<HandleExtension> {
        self.conflict_info
            .iter()
            .chain(self.finalized_info.iter())
            .cloned()
            .collect()
    }

    pub fn is_conflict(&self) -> bool {
        self.conflict_info.is_some()
    }

    pub fn is_local_conflict(&self) -> bool {
        self.conflict_info
            .as_ref()
            .is_some_and(|info| info.ext_type() == HandleExtensionType::LocalConflict)
    }

    pub fn is_final(&self) -> bool {
        self.finalized_info.is_some()
    }

    /// Returns a copy with the given conflict info.
    ///
    /// Conflict info can be set once, afterwards only the same info is accepted.
    pub fn with_updated_conflict_info(
        &self,
        info: Option<HandleExtension>,
    ) -> Result<Handle, HandleError> {
        let mut handle = self.clone();

        match &handle.conflict_info {
            None => {
                if info.is_some() {
                    handle.conflict_info = info;
                    handle.name = handle.recompute_name_with_extensions();
                }
                Ok(handle)
            }
            Some(expected) if Some(expected) == info.as_ref() => Ok(handle),
            Some(expected) => Err(HandleError::HandleExtensionMismatch {
                expected: expected.clone(),
                actual: info,
            }),
        }
    }

    /// Marks the folder as finalized, or removes the marker.
    pub fn set_finalized_info(&mut self, info: Option<HandleExtension>) {
        self.finalized_info = info;
        self.name = self.recompute_name_with_extensions();
    }

    fn recompute_name_with_extensions(&self) -> CanonicalName {
        let members = self
            .name
            .as_str()
            .split(EXTENSION_SEPARATOR)
            .next()
            .unwrap_or_default();

        let extensions = self.extensions();
        if extensions.is_empty() {
            return CanonicalName::from(members.to_string());
        }

        CanonicalName::from(format!(
            "{members}{EXTENSION_SEPARATOR}{}",
            format_extensions(&extensions, self.is_backed_by_team())
        ))
    }

    /// Compares all parts of two handles except their names.
    pub fn equals_ignore_name(&self, other: &Handle) -> bool {
        self.tlf_type == other.tlf_type
            && self.tlf_id == other.tlf_id
            && self.resolved_writers == other.resolved_writers
            && self.resolved_readers == other.resolved_readers
            && self.unresolved_writers == other.unresolved_writers
            && self.unresolved_readers == other.unresolved_readers
            && self.conflict_info == other.conflict_info
            && self.finalized_info == other.finalized_info
    }

    pub fn canonical_name(&self) -> &CanonicalName {
        &self.name
    }

    pub fn canonical_path(&self) -> String {
        build_canonical_path(self.tlf_type, self.name.as_str())
    }

    /// Name of the folder as shown to the given user, who is listed first if they are a writer.
    pub fn preferred_format(
        &self,
        username: Option<&NormalizedUsername>,
    ) -> Result<PreferredName, HandleError> {
        Ok(canonical_to_preferred_name(username, &self.name)?)
    }

    /// Identities of this handle without their names.
    pub fn to_bare_handle(&self) -> Result<BareHandle, HandleError> {
        let readers = match self.type_for_keying() {
            KeyingType::Public => vec![PUBLIC_UID],
            KeyingType::Team => Vec::new(),
            KeyingType::Private => self.resolved_readers(),
        };

        Ok(BareHandle::new(
            self.resolved_writers(),
            readers,
            self.unresolved_writers.clone(),
            self.unresolved_readers.clone(),
            self.extensions(),
        )?)
    }

    pub(crate) fn set_name(&mut self, name: CanonicalName) {
        self.name = name;
    }

    pub(crate) fn clear_conflict_info(&mut self) {
        self.conflict_info = None;
    }

    pub(crate) fn clear_finalized_info(&mut self) {
        self.finalized_info = None;
    }

    /// Takes over members and conflict info of another handle, keeping type, name and id.
    pub(crate) fn adopt_members(&mut self, other: &Handle) {
        self.resolved_writers = other.resolved_writers.clone();
        self.resolved_readers = other.resolved_readers.clone();
        self.unresolved_writers = other.unresolved_writers.clone();
        self.unresolved_readers = other.unresolved_readers.clone();
        self.conflict_info = other.conflict_info.clone();
    }
}
