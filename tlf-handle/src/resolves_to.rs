// SPDX-License-Identifier: MIT OR Apache-2.0

//! Re-resolving handles and checking whether an older handle evolved into a newer one.
//!
//! Folder membership can change over time without the folder changing: social assertions get
//! proven and resolve to users, conflicts get marked, folders get finalized after account
//! resets, and folders of users get migrated to implicit teams. When reading a folder's
//! history these checks make sure every handle is a valid successor of the previous one.
use std::sync::Arc;

use tracing::debug;
use tlf_core::{KeyingType, TlfId, UserOrTeamId};

use crate::context::RequestContext;
use crate::errors::HandleError;
use crate::handle::Handle;
use crate::make::make_handle_helper;
use crate::resolvable::{ResolvableAssertion, ResolvableUser};
use crate::services::PartialResolver;
use crate::traits::{IdGetter, OfflineStatusGetter, Resolver};

impl Handle {
    /// Tries to resolve the unresolved assertions of this handle again.
    ///
    /// With `must_be_user` set, assertions only resolve if they point at that user. Handles
    /// without unresolved assertions are returned unchanged.
    pub async fn resolve_again_for_user(
        &self,
        ctx: &RequestContext,
        resolver: &Arc<dyn Resolver>,
        id_getter: Option<&Arc<dyn IdGetter>>,
        offline_status: Option<&Arc<dyn OfflineStatusGetter>>,
        must_be_user: Option<UserOrTeamId>,
    ) -> Result<Handle, HandleError> {
        if !self.has_unresolved() {
            return Ok(self.clone());
        }

        let offline = offline_status
            .map(|status| status.offline_availability_for_id(self.tlf_id()))
            .unwrap_or_default();

        let resolvable_assertion = |assertion: String| {
            ResolvableUser::Assertion(ResolvableAssertion {
                assertion,
                must_be_user,
                resolver: resolver.clone(),
                identifier: None,
                id_getter: id_getter.cloned(),
                offline,
                changed: None,
            })
        };

        let members = self.resolved_users_map();
        let pair = |id: UserOrTeamId| {
            members
                .get(&id)
                .map(|name| ResolvableUser::NameIdPair(name.clone(), id))
        };

        let writers = self
            .resolved_writers()
            .into_iter()
            .filter_map(pair)
            .chain(
                self.unresolved_writers()
                    .iter()
                    .map(|assertion| resolvable_assertion(assertion.to_string())),
            )
            .collect();
        let readers = self
            .resolved_readers()
            .into_iter()
            .filter_map(pair)
            .chain(
                self.unresolved_readers()
                    .iter()
                    .map(|assertion| resolvable_assertion(assertion.to_string())),
            )
            .collect();

        make_handle_helper(
            ctx,
            self.tlf_type(),
            writers,
            readers,
            self.extensions(),
            id_getter,
        )
        .await
    }

    /// Tries to resolve the unresolved assertions of this handle again.
    ///
    /// Finalized handles never change anymore and are returned as they are.
    pub async fn resolve_again(
        &self,
        ctx: &RequestContext,
        resolver: &Arc<dyn Resolver>,
        id_getter: Option<&Arc<dyn IdGetter>>,
        offline_status: Option<&Arc<dyn OfflineStatusGetter>>,
    ) -> Result<Handle, HandleError> {
        if self.is_final() {
            return Ok(self.clone());
        }
        self.resolve_again_for_user(ctx, resolver, id_getter, offline_status, None)
            .await
    }

    /// Checks whether this handle, resolved again, describes the same folder as `other`.
    ///
    /// The following differences are tolerated:
    ///
    /// - `other` has conflict info or finalized info this handle doesn't have
    /// - assertions which are unresolved here got resolved in `other`
    /// - `other` is the implicit team which this folder of users migrated to
    ///
    /// Also returns this handle as resolved against `other`.
    pub async fn resolves_to(
        &self,
        ctx: &RequestContext,
        resolver: &Arc<dyn Resolver>,
        id_getter: Option<&Arc<dyn IdGetter>>,
        offline_status: Option<&Arc<dyn OfflineStatusGetter>>,
        other: &Handle,
    ) -> Result<(bool, Handle), HandleError> {
        let mut other = other.clone();

        if self.is_conflict()
            && other.is_conflict()
            && self.is_local_conflict() != other.is_local_conflict()
        {
            return Err(HandleError::ConflictTransition);
        }

        let conflict_added = !self.is_conflict() && other.is_conflict();
        if conflict_added {
            other.clear_conflict_info();
        }

        let mut finalized_added = false;
        if self.is_final() {
            if conflict_added {
                // A finalized folder can't be branched off.
                return Err(HandleError::HandleFinalized);
            }
        } else if other.is_final() {
            finalized_added = true;
            other.clear_finalized_info();
        }

        let self_team_keyed = self.type_for_keying() == KeyingType::Team;
        let partial = if self_team_keyed {
            // Membership of teams is tracked by the teams themselves.
            other.clone()
        } else {
            let resolver: Arc<dyn Resolver> = Arc::new(PartialResolver::new(
                resolver.clone(),
                other.unresolved_assertions(),
            ));
            self.resolve_again(ctx, &resolver, id_getter, offline_status)
                .await?
        };

        if other.type_for_keying() == KeyingType::Team && !self_team_keyed {
            if self.is_final() {
                return Err(HandleError::FinalizedMigration);
            }
            // Compare against the members of the team instead of the team itself.
            other.adopt_members(&partial);
        }

        let resolves_to = if conflict_added || finalized_added {
            partial.equals_ignore_name(&other)
        } else {
            partial == other
        };

        Ok((resolves_to, partial))
    }

    /// Checks that either handle resolves to the other.
    ///
    /// Fails with [`HandleError::HandleMismatch`] if neither does.
    #[allow(clippy::too_many_arguments)]
    pub async fn mutually_resolves_to(
        &self,
        ctx: &RequestContext,
        resolver: &Arc<dyn Resolver>,
        id_getter: Option<&Arc<dyn IdGetter>>,
        offline_status: Option<&Arc<dyn OfflineStatusGetter>>,
        other: &Handle,
        revision: u64,
        tlf_id: Option<TlfId>,
    ) -> Result<(), HandleError> {
        let (handle_resolves_to_other, partial_handle) = self
            .resolves_to(ctx, resolver, id_getter, offline_status, other)
            .await?;
        let (other_resolves_to_handle, partial_other) = other
            .resolves_to(ctx, resolver, id_getter, offline_status, self)
            .await?;

        let handle_path = self.canonical_path();
        let other_path = other.canonical_path();

        if !handle_resolves_to_other && !other_resolves_to_handle {
            return Err(HandleError::HandleMismatch {
                revision,
                path: handle_path.clone(),
                tlf_id,
                message: format!(
                    "unexpected handle path {other_path} ({handle_path} -> {}) ({other_path} -> {})",
                    partial_handle.canonical_path(),
                    partial_other.canonical_path(),
                ),
            });
        }

        if handle_path != other_path {
            debug!("handle for {handle_path} resolved to {other_path}");
        }

        Ok(())
    }
}
