// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identify orchestration: verifying the proofs of every member of a folder.
//!
//! Depending on the [`IdentifyBehavior`] of a request, broken proofs either fail the request
//! or get collected into a [`TlfBreak`] report which is published on the request's
//! [`ExtendedIdentify`] state.
use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use tlf_core::{NormalizedUsername, TlfType, UserOrTeamId, split_extension};

use crate::context::RequestContext;
use crate::errors::{HandleError, InternalError};
use crate::handle::Handle;
use crate::services::IdentityServices;
use crate::traits::{OfflineAvailability, OfflineStatusGetter};

/// What to do with the outcome of identifying folder members.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IdentifyBehavior {
    /// Fail on broken proofs.
    #[default]
    DefaultKbfs,

    /// Fail on broken proofs, used by command line chat clients.
    ChatCli,

    /// Collect broken proofs so they can be shown next to the conversation.
    ChatGui,

    /// Do not identify at all.
    ChatSkip,

    /// Collect broken proofs, background rekeys should never fail because of them.
    KbfsRekey,
}

impl IdentifyBehavior {
    pub fn skip_identify(&self) -> bool {
        matches!(self, IdentifyBehavior::ChatSkip)
    }

    pub fn warning_instead_of_error_on_broken_tracks(&self) -> bool {
        matches!(self, IdentifyBehavior::ChatGui | IdentifyBehavior::KbfsRekey)
    }
}

/// Broken proofs of one folder member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserBreak {
    pub user: NormalizedUsername,
    pub id: UserOrTeamId,
    pub broken_proofs: Vec<String>,
}

/// Broken proofs of all members of a folder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlfBreak {
    pub breaks: Vec<UserBreak>,
}

/// Identify behavior of a request and the break report it produced.
#[derive(Clone, Debug)]
pub struct ExtendedIdentify {
    behavior: IdentifyBehavior,
    tlf_breaks: Arc<watch::Sender<Option<TlfBreak>>>,
}

impl ExtendedIdentify {
    pub fn new(behavior: IdentifyBehavior) -> Self {
        let (tlf_breaks, _) = watch::channel(None);
        Self {
            behavior,
            tlf_breaks: Arc::new(tlf_breaks),
        }
    }

    pub fn behavior(&self) -> IdentifyBehavior {
        self.behavior
    }

    /// Latest published break report, `None` if no report was collected yet.
    pub fn tlf_breaks(&self) -> Option<TlfBreak> {
        self.tlf_breaks.borrow().clone()
    }

    /// Subscribe to break reports published by later identifies.
    pub fn subscribe(&self) -> watch::Receiver<Option<TlfBreak>> {
        self.tlf_breaks.subscribe()
    }

    fn publish(&self, tlf_break: TlfBreak) {
        self.tlf_breaks.send_replace(Some(tlf_break));
    }
}

/// Identifies every resolved member of a handle.
pub async fn identify_handle(
    ctx: &RequestContext,
    services: &IdentityServices,
    offline_status: Option<&Arc<dyn OfflineStatusGetter>>,
    handle: &Handle,
) -> Result<(), HandleError> {
    let offline = offline_status
        .map(|status| status.offline_availability_for_id(handle.tlf_id()))
        .unwrap_or_default();

    identify_user_list(
        ctx,
        services,
        handle.resolved_users_map(),
        handle.tlf_type(),
        handle.canonical_name().as_str(),
        offline,
    )
    .await
}

/// Identifies a list of identities concurrently, stopping at the first failure.
pub async fn identify_user_list(
    ctx: &RequestContext,
    services: &IdentityServices,
    ids: BTreeMap<UserOrTeamId, NormalizedUsername>,
    tlf_type: TlfType,
    tlf_name: &str,
    offline: OfflineAvailability,
) -> Result<(), HandleError> {
    let behavior = ctx.identify().behavior();
    if behavior.skip_identify() {
        debug!(%tlf_name, "skipping identify");
        return Ok(());
    }

    let scope = ctx.child();
    let _guard = scope.cancellation_token().clone().drop_guard();
    let reason = format!("You accessed a {tlf_type} folder with {tlf_name}.");

    let mut tasks = JoinSet::new();

    let breaks_tx = if behavior.warning_instead_of_error_on_broken_tracks() {
        let (breaks_tx, breaks_rx) = mpsc::channel(ids.len().max(1));
        tasks.spawn(collect_breaks(scope.clone(), breaks_rx, ids.len()));
        Some(breaks_tx)
    } else {
        None
    };

    for (id, name) in ids {
        tasks.spawn(identify_one(
            scope.clone(),
            services.clone(),
            id,
            name,
            tlf_type,
            reason.clone(),
            offline,
            breaks_tx.clone(),
        ));
    }
    drop(breaks_tx);

    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(|err| InternalError::TaskFailed(err.to_string()))?;
        // Returning drops the remaining tasks, which aborts them.
        result?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn identify_one(
    ctx: RequestContext,
    services: IdentityServices,
    id: UserOrTeamId,
    name: NormalizedUsername,
    tlf_type: TlfType,
    reason: String,
    offline: OfflineAvailability,
    breaks_tx: Option<mpsc::Sender<Option<UserBreak>>>,
) -> Result<(), HandleError> {
    if id.is_team_or_subteam() {
        // Implicit teams stand for their members, who are verified as a group.
        if tlf_type != TlfType::SingleTeam {
            let (assertions, suffix) = split_extension(name.as_str());
            let info = services
                .identifier
                .identify_implicit_team(&ctx, assertions, suffix, tlf_type, &reason, offline)
                .await?;
            if info.tid != id {
                return Err(InternalError::ImplicitTeamIdMismatch {
                    expected: id,
                    actual: info.tid,
                }
                .into());
            }
        }

        // Breaks of teams are not reported.
        return send_break(&ctx, breaks_tx, None).await;
    }

    let result = services
        .identifier
        .identify(&ctx, name.as_str(), &reason, offline)
        .await?;
    if result.id != id {
        return Err(HandleError::AssertionMismatch {
            assertion: id.to_string(),
            resolved: name,
            identified: result.name,
        });
    }

    let user_break = if result.broken_proofs.is_empty() {
        None
    } else {
        warn!(user = %name, count = result.broken_proofs.len(), "identify found broken proofs");
        Some(UserBreak {
            user: name.clone(),
            id,
            broken_proofs: result.broken_proofs,
        })
    };

    if let (None, Some(user_break)) = (&breaks_tx, &user_break) {
        return Err(HandleError::IdentifyBroken {
            name,
            count: user_break.broken_proofs.len(),
        });
    }

    send_break(&ctx, breaks_tx, user_break).await
}

async fn send_break(
    ctx: &RequestContext,
    breaks_tx: Option<mpsc::Sender<Option<UserBreak>>>,
    user_break: Option<UserBreak>,
) -> Result<(), HandleError> {
    let Some(breaks_tx) = breaks_tx else {
        return Ok(());
    };

    tokio::select! {
        biased;
        err = ctx.done() => Err(err),
        result = breaks_tx.send(user_break) => {
            result.map_err(|_| HandleError::from(InternalError::BreakChannelClosed))
        }
    }
}

/// Waits for exactly one record per identity and publishes the aggregate report.
async fn collect_breaks(
    ctx: RequestContext,
    mut breaks_rx: mpsc::Receiver<Option<UserBreak>>,
    expected: usize,
) -> Result<(), HandleError> {
    let mut tlf_break = TlfBreak::default();

    for _ in 0..expected {
        tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            user_break = breaks_rx.recv() => match user_break {
                Some(Some(user_break)) => tlf_break.breaks.push(user_break),
                Some(None) => (),
                None => return Err(InternalError::BreakChannelClosed.into()),
            },
        }
    }

    breaks_rx.close();
    ctx.identify().publish(tlf_break);
    Ok(())
}
