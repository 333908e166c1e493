// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strategies for turning one member of a folder name into an identity.
//!
//! Every strategy ends in exactly one of three outcomes: a resolved name and id, an unresolved
//! social assertion, or an error. Some strategies additionally learn the folder id on the way,
//! for example when the member is a team which already owns a folder.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use tlf_core::assertion::AND_SEPARATOR;
use tlf_core::{
    NormalizedUsername, PUBLIC_UID_NAME, SocialAssertion, TEAM_ASSERTION_PREFIX, TlfId, TlfType,
    UserOrTeamId, split_extension,
};

use crate::context::RequestContext;
use crate::errors::{HandleError, InternalError};
use crate::traits::{
    IdGetter, Identifier, NormalizedUsernameGetter, OfflineAvailability, Resolver,
};

/// Outcome of resolving one member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    Resolved(NormalizedUsername, UserOrTeamId),
    Unresolved(SocialAssertion),
}

/// One member of a folder, waiting to be resolved.
pub(crate) enum ResolvableUser {
    /// Identity known by id, for example from a persisted bare handle.
    Id(ResolvableId),

    /// Assertion which is known to be unresolved.
    SocialAssertion(SocialAssertion),

    /// Identity which was resolved before.
    NameIdPair(NormalizedUsername, UserOrTeamId),

    /// Assertion typed by a user.
    Assertion(ResolvableAssertion),

    /// Whole folder name, looked up as the implicit team backing it.
    ImplicitTeam(ResolvableImplicitTeam),
}

impl ResolvableUser {
    pub(crate) async fn resolve(
        &self,
        ctx: &RequestContext,
    ) -> Result<(Resolution, Option<TlfId>), HandleError> {
        match self {
            ResolvableUser::Id(id) => id.resolve(ctx).await,
            ResolvableUser::SocialAssertion(assertion) => {
                Ok((Resolution::Unresolved(assertion.clone()), None))
            }
            ResolvableUser::NameIdPair(name, id) => {
                Ok((Resolution::Resolved(name.clone(), *id), None))
            }
            ResolvableUser::Assertion(assertion) => assertion.resolve(ctx).await,
            ResolvableUser::ImplicitTeam(team) => team.resolve(ctx).await,
        }
    }
}

pub(crate) struct ResolvableId {
    pub id: UserOrTeamId,
    pub tlf_type: TlfType,
    pub resolver: Arc<dyn Resolver>,
    pub usernames: Arc<dyn NormalizedUsernameGetter>,
    pub id_getter: Option<Arc<dyn IdGetter>>,
    pub offline: OfflineAvailability,
}

impl ResolvableId {
    async fn resolve(
        &self,
        ctx: &RequestContext,
    ) -> Result<(Resolution, Option<TlfId>), HandleError> {
        if self.tlf_type != TlfType::SingleTeam
            && self.id.is_team_or_subteam()
            && ctx.resolve_implicit_teams()
        {
            match self
                .resolver
                .resolve_implicit_team_by_id(ctx, self.id, self.tlf_type, self.offline)
                .await
            {
                Ok(info) if info.tid != self.id => {
                    return Err(InternalError::ImplicitTeamIdMismatch {
                        expected: self.id,
                        actual: info.tid,
                    }
                    .into());
                }
                Ok(info) => {
                    return Ok((Resolution::Resolved(info.name, self.id), info.tlf_id));
                }
                Err(err) => {
                    let err = HandleError::from(err);
                    if err.is_canceled() {
                        return Err(err);
                    }
                    // Not an implicit team, resolve it as a regular team.
                    debug!(id = %self.id, %err, "team is not an implicit team");
                }
            }
        }

        let name = self
            .usernames
            .get_normalized_username(ctx, self.id, self.offline)
            .await?;

        let tlf_id = if self.id_getter.is_some() && self.id.is_team_or_subteam() {
            self.resolver
                .resolve_team_tlf_id(ctx, self.id, self.offline)
                .await?
        } else {
            None
        };

        Ok((Resolution::Resolved(name, self.id), tlf_id))
    }
}

pub(crate) struct ResolvableAssertion {
    pub assertion: String,

    /// Only accept the assertion if it resolves to this user.
    pub must_be_user: Option<UserOrTeamId>,

    pub resolver: Arc<dyn Resolver>,

    /// Required for AND assertions, which get identified right away.
    pub identifier: Option<Arc<dyn Identifier>>,

    pub id_getter: Option<Arc<dyn IdGetter>>,
    pub offline: OfflineAvailability,

    /// Set when the resolved name differs from the typed assertion.
    pub changed: Option<Arc<AtomicBool>>,
}

impl ResolvableAssertion {
    async fn resolve(
        &self,
        ctx: &RequestContext,
    ) -> Result<(Resolution, Option<TlfId>), HandleError> {
        let (resolution, tlf_id) = self.resolve_inner(ctx).await?;

        if let Some(changed) = &self.changed {
            let typed = self
                .assertion
                .strip_prefix(TEAM_ASSERTION_PREFIX)
                .unwrap_or(&self.assertion);
            let differs = match &resolution {
                Resolution::Resolved(name, _) => name.as_str() != typed,
                Resolution::Unresolved(assertion) => assertion.to_string() != self.assertion,
            };
            if differs {
                changed.store(true, Ordering::Release);
            }
        }

        Ok((resolution, tlf_id))
    }

    async fn resolve_inner(
        &self,
        ctx: &RequestContext,
    ) -> Result<(Resolution, Option<TlfId>), HandleError> {
        if self.assertion == PUBLIC_UID_NAME {
            return Err(HandleError::BadName(self.assertion.clone()));
        }

        let resolved = self
            .resolver
            .resolve(ctx, &self.assertion, self.offline)
            .await
            .map_err(HandleError::from)
            .and_then(|(name, id)| match self.must_be_user {
                Some(user) if user != id => Err(HandleError::NoSuchUser(self.assertion.clone())),
                _ => Ok((name, id)),
            });

        let (name, id) = match resolved {
            Ok(resolved) => resolved,
            Err(err @ HandleError::NoSuchUser(_)) => {
                // Unknown assertions stay in the name as long as they are valid social ones.
                return match self
                    .resolver
                    .normalize_social_assertion(ctx, &self.assertion)
                    .await
                {
                    Ok(assertion) => Ok((Resolution::Unresolved(assertion), None)),
                    Err(_) => Err(err),
                };
            }
            Err(err) => return Err(err),
        };

        if self.assertion.contains(AND_SEPARATOR) {
            let identifier = self
                .identifier
                .as_ref()
                .ok_or_else(|| InternalError::MissingIdentifier(self.assertion.clone()))?;
            let reason = format!("You accessed a folder with {}.", self.assertion);
            let result = identifier
                .identify(ctx, &self.assertion, &reason, self.offline)
                .await?;
            if result.name != name {
                return Err(HandleError::AssertionMismatch {
                    assertion: self.assertion.clone(),
                    resolved: name,
                    identified: result.name,
                });
            }
        }

        let tlf_id = if self.id_getter.is_some() && id.is_team_or_subteam() {
            self.resolver
                .resolve_team_tlf_id(ctx, id, self.offline)
                .await?
        } else {
            None
        };

        Ok((Resolution::Resolved(name, id), tlf_id))
    }
}

pub(crate) struct ResolvableImplicitTeam {
    /// Full folder name including the extension suffix.
    pub name: String,
    pub tlf_type: TlfType,
    pub resolver: Arc<dyn Resolver>,
    pub offline: OfflineAvailability,
}

impl ResolvableImplicitTeam {
    async fn resolve(
        &self,
        ctx: &RequestContext,
    ) -> Result<(Resolution, Option<TlfId>), HandleError> {
        let (assertions, suffix) = split_extension(&self.name);
        let info = self
            .resolver
            .resolve_implicit_team(ctx, assertions, suffix, self.tlf_type, self.offline)
            .await?;
        Ok((Resolution::Resolved(info.name, info.tid), info.tlf_id))
    }
}
