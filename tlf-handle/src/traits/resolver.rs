// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use tlf_core::{NormalizedUsername, SocialAssertion, TlfId, TlfType, UserOrTeamId};

use crate::context::RequestContext;
use crate::errors::IdentityError;
use crate::traits::OfflineAvailability;

/// Team created on the fly for a folder of users, named by its members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImplicitTeamInfo {
    /// Display name, for example `alice,bob#carol (conflicted copy 2016-03-14 #2)`.
    pub name: NormalizedUsername,

    pub tid: UserOrTeamId,

    /// Storage of the folder backed by this team, if one was created already.
    pub tlf_id: Option<TlfId>,
}

/// Turns assertions and team names into identities.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves an assertion (`alice`, `alice@twitter`, `team:eng`, `ID@uid`, ..) into a name
    /// and identity.
    ///
    /// Returns [`IdentityError::NoSuchUser`] if nothing is known under this assertion.
    async fn resolve(
        &self,
        ctx: &RequestContext,
        assertion: &str,
        offline: OfflineAvailability,
    ) -> Result<(NormalizedUsername, UserOrTeamId), IdentityError>;

    /// Looks up the implicit team for a list of member assertions and an extension suffix.
    async fn resolve_implicit_team(
        &self,
        ctx: &RequestContext,
        assertions: &str,
        suffix: &str,
        tlf_type: TlfType,
        offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError>;

    async fn resolve_implicit_team_by_id(
        &self,
        ctx: &RequestContext,
        team_id: UserOrTeamId,
        tlf_type: TlfType,
        offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError>;

    /// Folder storage associated with a team, if there is one.
    async fn resolve_team_tlf_id(
        &self,
        ctx: &RequestContext,
        team_id: UserOrTeamId,
        offline: OfflineAvailability,
    ) -> Result<Option<TlfId>, IdentityError>;

    /// Normalizes a social assertion, possibly consulting service-specific rules.
    async fn normalize_social_assertion(
        &self,
        ctx: &RequestContext,
        assertion: &str,
    ) -> Result<SocialAssertion, IdentityError>;
}
