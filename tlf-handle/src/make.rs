// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent resolution of all members of a folder into a [`Handle`].
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, trace};
use tlf_core::{
    HandleExtension, NormalizedUsername, SocialAssertion, TlfId, TlfType, UserOrTeamId,
    make_canonical_name, sort_and_splat_extensions,
};

use crate::context::RequestContext;
use crate::errors::{HandleError, InternalError};
use crate::handle::{Handle, Members};
use crate::resolvable::{Resolution, ResolvableUser};
use crate::traits::IdGetter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Writer,
    Reader,
}

/// Members as they come in from the resolution tasks, in arbitrary order.
#[derive(Default)]
struct Collected {
    resolved_writers: BTreeMap<UserOrTeamId, NormalizedUsername>,
    resolved_readers: BTreeMap<UserOrTeamId, NormalizedUsername>,
    unresolved_writers: BTreeSet<SocialAssertion>,
    unresolved_readers: BTreeSet<SocialAssertion>,
}

impl Collected {
    fn insert(&mut self, role: Role, resolution: Resolution) {
        match (role, resolution) {
            (Role::Writer, Resolution::Resolved(name, id)) => {
                self.resolved_writers.insert(id, name);
            }
            (Role::Reader, Resolution::Resolved(name, id)) => {
                self.resolved_readers.insert(id, name);
            }
            (Role::Writer, Resolution::Unresolved(assertion)) => {
                self.unresolved_writers.insert(assertion);
            }
            (Role::Reader, Resolution::Unresolved(assertion)) => {
                self.unresolved_readers.insert(assertion);
            }
        }
    }
}

/// Resolves writers and readers concurrently and builds the canonical handle from them.
///
/// The first failing member fails the whole handle and cancels all other lookups. If any
/// member learns the folder id, it is used for the handle; more than one id is a fatal error.
pub(crate) async fn make_handle_helper(
    ctx: &RequestContext,
    tlf_type: TlfType,
    writers: Vec<ResolvableUser>,
    readers: Vec<ResolvableUser>,
    extensions: Vec<HandleExtension>,
    id_getter: Option<&Arc<dyn IdGetter>>,
) -> Result<Handle, HandleError> {
    if tlf_type != TlfType::Private && !readers.is_empty() {
        return Err(HandleError::ReadersNotAllowed { tlf_type });
    }

    if tlf_type == TlfType::SingleTeam && writers.len() != 1 {
        return Err(HandleError::InvalidTeamWriters(writers.len()));
    }

    // Only a folder typed with a single writer and no readers can be an implicit team.
    let single_writer = writers.len() == 1 && readers.is_empty();

    let (mut collected, tlf_id) = resolve_members(ctx, writers, readers).await?;

    // Writers take precedence over readers.
    collected
        .resolved_readers
        .retain(|id, _| !collected.resolved_writers.contains_key(id));
    collected
        .unresolved_readers
        .retain(|assertion| !collected.unresolved_writers.contains(assertion));

    // Unresolved readers only make sense for private folders.
    if tlf_type != TlfType::Private {
        collected.unresolved_readers.clear();
    }

    let (conflict_info, finalized_info) = sort_and_splat_extensions(extensions)?;
    let extensions: Vec<HandleExtension> = conflict_info
        .iter()
        .chain(finalized_info.iter())
        .cloned()
        .collect();

    let is_implicit = tlf_type != TlfType::SingleTeam
        && single_writer
        && collected.resolved_writers.len() == 1
        && collected
            .resolved_writers
            .keys()
            .all(|id| id.is_team_or_subteam());

    let writer_names = collected
        .resolved_writers
        .values()
        .map(|name| name.to_string())
        .chain(collected.unresolved_writers.iter().map(|a| a.to_string()));
    let reader_names = collected
        .resolved_readers
        .values()
        .map(|name| name.to_string())
        .chain(collected.unresolved_readers.iter().map(|a| a.to_string()));
    let name = make_canonical_name(
        writer_names,
        reader_names,
        &extensions,
        is_implicit || tlf_type == TlfType::SingleTeam,
    );

    let kinds_valid = match tlf_type {
        TlfType::Private | TlfType::Public => {
            (is_implicit
                || collected
                    .resolved_writers
                    .keys()
                    .all(|id| !id.is_team_or_subteam()))
                && collected
                    .resolved_readers
                    .keys()
                    .all(|id| !id.is_team_or_subteam())
        }
        TlfType::SingleTeam => {
            collected.resolved_writers.len() == 1
                && collected
                    .resolved_writers
                    .keys()
                    .all(|id| id.is_team_or_subteam())
        }
    };
    if !kinds_valid {
        return Err(HandleError::NoSuchName(name.to_string()));
    }

    let members = Members {
        resolved_writers: collected.resolved_writers,
        resolved_readers: collected.resolved_readers,
        unresolved_writers: collected.unresolved_writers.into_iter().collect(),
        unresolved_readers: collected.unresolved_readers.into_iter().collect(),
    };
    let mut handle = Handle::new(
        tlf_type,
        members,
        conflict_info,
        finalized_info,
        name,
        tlf_id,
    );

    let need_id_lookup = (!is_implicit && handle.tlf_id().is_none()) || handle.is_local_conflict();
    if need_id_lookup {
        if let Some(id_getter) = id_getter {
            let tlf_id = id_getter.get_id_for_handle(ctx, &handle).await?;
            debug!(
                name = %handle.canonical_name(),
                tlf_id = ?tlf_id,
                "looked up folder id for handle"
            );
            handle.set_tlf_id(tlf_id);
        }
    }

    if let Some(tlf_id) = handle.tlf_id() {
        if tlf_id.tlf_type() != tlf_type {
            return Err(InternalError::TlfIdTypeMismatch {
                expected: tlf_type,
                actual: tlf_id.tlf_type(),
            }
            .into());
        }
    }

    Ok(handle)
}

/// Resolves every member in its own task and collects the results.
async fn resolve_members(
    ctx: &RequestContext,
    writers: Vec<ResolvableUser>,
    readers: Vec<ResolvableUser>,
) -> Result<(Collected, Option<TlfId>), HandleError> {
    let total = writers.len() + readers.len();
    trace!(total, "resolving folder members");

    let scope = ctx.child();
    // Outstanding lookups are canceled as soon as we return, successful or not.
    let _guard = scope.cancellation_token().clone().drop_guard();

    // Only the first error is kept, the others get dropped.
    let (err_tx, mut err_rx) = mpsc::channel::<HandleError>(1);
    let (results_tx, mut results_rx) = mpsc::channel::<(Role, Resolution)>(total.max(1));
    let (id_tx, mut id_rx) = mpsc::channel::<TlfId>(1);

    let mut workers = JoinSet::new();
    let users = writers
        .into_iter()
        .map(|user| (Role::Writer, user))
        .chain(readers.into_iter().map(|user| (Role::Reader, user)));
    for (role, user) in users {
        workers.spawn(resolve_one_user(
            scope.clone(),
            role,
            user,
            err_tx.clone(),
            results_tx.clone(),
            id_tx.clone(),
        ));
    }
    drop((err_tx, results_tx, id_tx));

    let mut collected = Collected::default();
    let mut received = 0;
    while received < total {
        tokio::select! {
            biased;

            Some(err) = err_rx.recv() => return Err(err),

            err = scope.done() => return Err(err),

            result = results_rx.recv() => match result {
                Some((role, resolution)) => {
                    collected.insert(role, resolution);
                    received += 1;
                }
                None => {
                    // All tasks are gone, an error might still be waiting.
                    return Err(err_rx
                        .try_recv()
                        .unwrap_or(InternalError::ResolutionAborted.into()));
                }
            },
        }
    }

    // Every task sent its id before its result, so all ids are buffered by now.
    id_rx.close();
    let tlf_id = id_rx.try_recv().ok();
    if let Ok(second) = id_rx.try_recv() {
        return Err(InternalError::MultipleTlfIds(second).into());
    }

    Ok((collected, tlf_id))
}

async fn resolve_one_user(
    ctx: RequestContext,
    role: Role,
    user: ResolvableUser,
    err_tx: mpsc::Sender<HandleError>,
    results_tx: mpsc::Sender<(Role, Resolution)>,
    id_tx: mpsc::Sender<TlfId>,
) {
    let resolved = tokio::select! {
        biased;
        _ = ctx.cancellation_token().cancelled() => return,
        resolved = user.resolve(&ctx) => resolved,
    };

    let (resolution, tlf_id) = match resolved {
        Ok(resolved) => resolved,
        Err(err) => {
            let _ = err_tx.try_send(err);
            return;
        }
    };

    if let Some(tlf_id) = tlf_id {
        if id_tx.try_send(tlf_id).is_err() {
            let _ = err_tx.try_send(InternalError::MultipleTlfIds(tlf_id).into());
            return;
        }
    }

    let _ = results_tx.send((role, resolution)).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use tlf_core::{NormalizedUsername, PUBLIC_UID_NAME, TlfType};

    use crate::context::RequestContext;
    use crate::errors::HandleError;
    use crate::resolvable::{ResolvableAssertion, ResolvableUser};
    use crate::test_utils::{LocalDaemon, make_test_team_id, make_test_uid};
    use crate::traits::{OfflineAvailability, Resolver};

    use super::make_handle_helper;

    fn pair(n: u32) -> ResolvableUser {
        ResolvableUser::NameIdPair(NormalizedUsername::new(&format!("u{n}")), make_test_uid(n))
    }

    fn assertion(resolver: &Arc<dyn Resolver>, assertion: &str) -> ResolvableUser {
        ResolvableUser::Assertion(ResolvableAssertion {
            assertion: assertion.to_string(),
            must_be_user: None,
            resolver: resolver.clone(),
            identifier: None,
            id_getter: None,
            offline: OfflineAvailability::None,
            changed: None,
        })
    }

    #[tokio::test]
    async fn member_constraints() {
        let ctx = RequestContext::default();

        assert_matches!(
            make_handle_helper(&ctx, TlfType::Public, vec![pair(1)], vec![pair(2)], vec![], None)
                .await,
            Err(HandleError::ReadersNotAllowed {
                tlf_type: TlfType::Public
            })
        );

        assert_matches!(
            make_handle_helper(
                &ctx,
                TlfType::SingleTeam,
                vec![pair(1), pair(2)],
                vec![],
                vec![],
                None
            )
            .await,
            Err(HandleError::InvalidTeamWriters(2))
        );

        // Users can't be the writer of a team folder.
        assert_matches!(
            make_handle_helper(&ctx, TlfType::SingleTeam, vec![pair(1)], vec![], vec![], None)
                .await,
            Err(HandleError::NoSuchName(name)) if name == "u1"
        );

        // Teams can't be readers.
        let team = ResolvableUser::NameIdPair(
            NormalizedUsername::new("t1"),
            make_test_team_id(1, false),
        );
        assert_matches!(
            make_handle_helper(&ctx, TlfType::Private, vec![pair(1)], vec![team], vec![], None)
                .await,
            Err(HandleError::NoSuchName(name)) if name == "u1#t1"
        );
    }

    #[tokio::test]
    async fn implicit_team_needs_a_single_typed_writer() {
        let ctx = RequestContext::default();
        let team = || {
            ResolvableUser::NameIdPair(NormalizedUsername::new("t1"), make_test_team_id(1, false))
        };

        let handle =
            make_handle_helper(&ctx, TlfType::Private, vec![team()], vec![], vec![], None)
                .await
                .unwrap();
        assert!(handle.is_backed_by_team());
        assert_eq!(handle.canonical_name().as_str(), "t1");

        // Collapsing onto one team after deduplication doesn't make a folder implicit.
        assert_matches!(
            make_handle_helper(&ctx, TlfType::Private, vec![team()], vec![team()], vec![], None)
                .await,
            Err(HandleError::NoSuchName(name)) if name == "t1"
        );
        assert_matches!(
            make_handle_helper(
                &ctx,
                TlfType::Private,
                vec![team(), team()],
                vec![],
                vec![],
                None
            )
            .await,
            Err(HandleError::NoSuchName(name)) if name == "t1"
        );
    }

    #[tokio::test]
    async fn members_are_deduplicated_and_sorted() {
        let ctx = RequestContext::default();

        let handle = make_handle_helper(
            &ctx,
            TlfType::Private,
            vec![pair(3), pair(1), pair(3)],
            vec![pair(2), pair(1)],
            vec![],
            None,
        )
        .await
        .unwrap();
        assert_eq!(handle.canonical_name().as_str(), "u1,u3#u2");
        assert_eq!(
            handle.resolved_writers(),
            vec![make_test_uid(1), make_test_uid(3)]
        );
        assert_eq!(handle.resolved_readers(), vec![make_test_uid(2)]);
    }

    #[tokio::test]
    async fn first_error_wins() {
        let daemon = Arc::new(LocalDaemon::new("u1", &["u1", "u2"]));
        let resolver: Arc<dyn Resolver> = daemon;
        let ctx = RequestContext::default();

        let writers = vec![
            assertion(&resolver, "u1"),
            assertion(&resolver, PUBLIC_UID_NAME),
            assertion(&resolver, "u2"),
        ];
        assert_matches!(
            make_handle_helper(&ctx, TlfType::Private, writers, vec![], vec![], None).await,
            Err(HandleError::BadName(name)) if name == PUBLIC_UID_NAME
        );

        // The caller's scope is left intact.
        assert!(ctx.check().is_ok());
    }
}
