// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tlf_core::{NormalizedUsername, SocialAssertion, TlfId, TlfType, UserOrTeamId};

use crate::context::RequestContext;
use crate::errors::{HandleError, IdentityError};
use crate::handle::Handle;
use crate::traits::{
    IdGetter, Identifier, ImplicitTeamInfo, NormalizedUsernameGetter, OfflineAvailability,
    Resolver, SessionGetter,
};

/// Identity services a handle is resolved against.
#[derive(Clone)]
pub struct IdentityServices {
    pub resolver: Arc<dyn Resolver>,
    pub identifier: Arc<dyn Identifier>,
    pub usernames: Arc<dyn NormalizedUsernameGetter>,
    pub sessions: Arc<dyn SessionGetter>,
}

impl IdentityServices {
    /// Uses one service for all lookups.
    pub fn new<T>(service: Arc<T>) -> Self
    where
        T: Resolver + Identifier + NormalizedUsernameGetter + SessionGetter + 'static,
    {
        Self {
            resolver: service.clone(),
            identifier: service.clone(),
            usernames: service.clone(),
            sessions: service,
        }
    }

    /// Same services with a different resolver.
    pub fn with_resolver(&self, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            ..self.clone()
        }
    }
}

/// Resolver which treats a fixed set of assertions as unknown.
///
/// Used when re-resolving an older handle against a newer one, so that assertions which are
/// still unresolved in the newer handle stay unresolved in the older one as well.
pub(crate) struct PartialResolver {
    inner: Arc<dyn Resolver>,
    unresolved: BTreeSet<String>,
}

impl PartialResolver {
    pub(crate) fn new(inner: Arc<dyn Resolver>, unresolved: BTreeSet<String>) -> Self {
        Self { inner, unresolved }
    }
}

#[async_trait]
impl Resolver for PartialResolver {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        assertion: &str,
        offline: OfflineAvailability,
    ) -> Result<(NormalizedUsername, UserOrTeamId), IdentityError> {
        if self.unresolved.contains(assertion) {
            return Err(IdentityError::NoSuchUser(assertion.to_string()));
        }
        self.inner.resolve(ctx, assertion, offline).await
    }

    async fn resolve_implicit_team(
        &self,
        ctx: &RequestContext,
        assertions: &str,
        suffix: &str,
        tlf_type: TlfType,
        offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError> {
        self.inner
            .resolve_implicit_team(ctx, assertions, suffix, tlf_type, offline)
            .await
    }

    async fn resolve_implicit_team_by_id(
        &self,
        ctx: &RequestContext,
        team_id: UserOrTeamId,
        tlf_type: TlfType,
        offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError> {
        self.inner
            .resolve_implicit_team_by_id(ctx, team_id, tlf_type, offline)
            .await
    }

    async fn resolve_team_tlf_id(
        &self,
        ctx: &RequestContext,
        team_id: UserOrTeamId,
        offline: OfflineAvailability,
    ) -> Result<Option<TlfId>, IdentityError> {
        self.inner.resolve_team_tlf_id(ctx, team_id, offline).await
    }

    async fn normalize_social_assertion(
        &self,
        ctx: &RequestContext,
        assertion: &str,
    ) -> Result<SocialAssertion, IdentityError> {
        self.inner.normalize_social_assertion(ctx, assertion).await
    }
}

/// Resolver which refuses implicit team lookups, for quick parsing of names.
pub(crate) struct NoImplicitTeamResolver {
    inner: Arc<dyn Resolver>,
}

impl NoImplicitTeamResolver {
    pub(crate) fn new(inner: Arc<dyn Resolver>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Resolver for NoImplicitTeamResolver {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        assertion: &str,
        offline: OfflineAvailability,
    ) -> Result<(NormalizedUsername, UserOrTeamId), IdentityError> {
        self.inner.resolve(ctx, assertion, offline).await
    }

    async fn resolve_implicit_team(
        &self,
        _ctx: &RequestContext,
        _assertions: &str,
        _suffix: &str,
        _tlf_type: TlfType,
        _offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError> {
        Err(IdentityError::Service(
            "skipping implicit team lookup for quick handle parsing".into(),
        ))
    }

    async fn resolve_implicit_team_by_id(
        &self,
        ctx: &RequestContext,
        team_id: UserOrTeamId,
        tlf_type: TlfType,
        offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError> {
        self.inner
            .resolve_implicit_team_by_id(ctx, team_id, tlf_type, offline)
            .await
    }

    async fn resolve_team_tlf_id(
        &self,
        ctx: &RequestContext,
        team_id: UserOrTeamId,
        offline: OfflineAvailability,
    ) -> Result<Option<TlfId>, IdentityError> {
        self.inner.resolve_team_tlf_id(ctx, team_id, offline).await
    }

    async fn normalize_social_assertion(
        &self,
        ctx: &RequestContext,
        assertion: &str,
    ) -> Result<SocialAssertion, IdentityError> {
        self.inner.normalize_social_assertion(ctx, assertion).await
    }
}

/// Id getter which returns the same folder id for every handle.
#[derive(Clone, Copy, Debug)]
pub struct ConstIdGetter {
    pub tlf_id: Option<TlfId>,
}

#[async_trait]
impl IdGetter for ConstIdGetter {
    async fn get_id_for_handle(
        &self,
        _ctx: &RequestContext,
        _handle: &Handle,
    ) -> Result<Option<TlfId>, HandleError> {
        Ok(self.tlf_id)
    }

    async fn validate_latest_handle_not_final(
        &self,
        _ctx: &RequestContext,
        _handle: &Handle,
    ) -> Result<bool, HandleError> {
        Ok(true)
    }
}
