// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sparse, serializable form of a resolved folder handle.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assertion::SocialAssertion;
use crate::extension::{ExtensionError, HandleExtension, sort_and_splat_extensions};
use crate::id::{PUBLIC_UID, UserOrTeamId};
use crate::types::TlfType;

/// Identities of a folder without any of their names.
///
/// This is what gets persisted next to folder metadata. Turning it back into a full handle
/// requires looking up the names of all identities again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BareHandle {
    writers: Vec<UserOrTeamId>,
    readers: Vec<UserOrTeamId>,
    unresolved_writers: Vec<SocialAssertion>,
    unresolved_readers: Vec<SocialAssertion>,
    conflict_info: Option<HandleExtension>,
    finalized_info: Option<HandleExtension>,
}

impl BareHandle {
    /// Builds a bare handle, sorting all lists.
    pub fn new(
        mut writers: Vec<UserOrTeamId>,
        mut readers: Vec<UserOrTeamId>,
        mut unresolved_writers: Vec<SocialAssertion>,
        mut unresolved_readers: Vec<SocialAssertion>,
        extensions: Vec<HandleExtension>,
    ) -> Result<Self, BareHandleError> {
        if writers.is_empty() && unresolved_writers.is_empty() {
            return Err(BareHandleError::NoWriters);
        }

        if writers.contains(&PUBLIC_UID) {
            return Err(BareHandleError::PublicWriter);
        }

        if readers.contains(&PUBLIC_UID)
            && (readers.len() > 1 || !unresolved_readers.is_empty())
        {
            return Err(BareHandleError::PublicWithReaders);
        }

        let has_team_writer = writers.iter().any(|id| id.is_team_or_subteam());
        if has_team_writer
            && (writers.len() > 1 || !unresolved_writers.is_empty() || !readers.is_empty())
        {
            return Err(BareHandleError::TeamWithMembers);
        }

        writers.sort();
        readers.sort();
        unresolved_writers.sort();
        unresolved_readers.sort();

        let (conflict_info, finalized_info) = sort_and_splat_extensions(extensions)?;

        Ok(Self {
            writers,
            readers,
            unresolved_writers,
            unresolved_readers,
            conflict_info,
            finalized_info,
        })
    }

    /// Folder type derived from the identities.
    pub fn tlf_type(&self) -> TlfType {
        if self.readers.len() == 1 && self.readers[0] == PUBLIC_UID {
            return TlfType::Public;
        }

        if self.writers.len() == 1 && self.writers[0].is_team_or_subteam() && self.readers.is_empty()
        {
            return TlfType::SingleTeam;
        }

        TlfType::Private
    }

    pub fn writers(&self) -> &[UserOrTeamId] {
        &self.writers
    }

    pub fn readers(&self) -> &[UserOrTeamId] {
        &self.readers
    }

    pub fn unresolved_writers(&self) -> &[SocialAssertion] {
        &self.unresolved_writers
    }

    pub fn unresolved_readers(&self) -> &[SocialAssertion] {
        &self.unresolved_readers
    }

    pub fn conflict_info(&self) -> Option<&HandleExtension> {
        self.conflict_info.as_ref()
    }

    pub fn finalized_info(&self) -> Option<&HandleExtension> {
        self.finalized_info.as_ref()
    }

    /// Conflict and finalized info in name order.
    pub fn extensions(&self) -> Vec<HandleExtension> {
        self.conflict_info
            .iter()
            .chain(self.finalized_info.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum BareHandleError {
    #[error("folder handle has no writers")]
    NoWriters,

    #[error("the public placeholder can not be a writer")]
    PublicWriter,

    #[error("public folder can not have any other readers")]
    PublicWithReaders,

    #[error("team folder can not have any other members")]
    TeamWithMembers,

    #[error(transparent)]
    Extension(#[from] ExtensionError),
}
