// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry points turning folder names and persisted bare handles into [`Handle`] values.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use tlf_core::name::normalize_names_in_tlf;
use tlf_core::extension::EXTENSION_SEPARATOR;
use tlf_core::{
    BareHandle, CanonicalName, HandleExtension, TEAM_ASSERTION_PREFIX, TlfId, TlfType,
    build_canonical_path, contains_local_conflict_prefix, format_extensions,
    parse_extension_suffix, sort_and_splat_extensions, split_and_normalize_tlf_name,
    split_extension,
};

use crate::context::RequestContext;
use crate::errors::{HandleError, IdentityError, InternalError};
use crate::handle::Handle;
use crate::identify::identify_handle;
use crate::make::make_handle_helper;
use crate::resolvable::{
    ResolvableAssertion, ResolvableId, ResolvableImplicitTeam, ResolvableUser,
};
use crate::services::{ConstIdGetter, IdentityServices, NoImplicitTeamResolver};
use crate::traits::{
    IdGetter, NormalizedUsernameGetter, OfflineAvailability, OfflineStatusGetter, Resolver,
    Session, SessionGetter,
};

/// Parses a folder name into a fully resolved handle.
///
/// Names which resolve but are not written canonically (unsorted, not normalized, or with
/// assertions that resolved to a different name) fail with
/// [`HandleError::NameNotCanonical`], carrying the name to retry with.
pub async fn parse_handle(
    ctx: &RequestContext,
    services: &IdentityServices,
    id_getter: Option<&Arc<dyn IdGetter>>,
    offline_status: Option<&Arc<dyn OfflineStatusGetter>>,
    name: &str,
    tlf_type: TlfType,
) -> Result<Handle, HandleError> {
    let (handle, changed) =
        parse_handle_loose(ctx, services, id_getter, offline_status, name, tlf_type).await?;

    if changed || handle.canonical_name().as_str() != name {
        return Err(HandleError::NameNotCanonical {
            name: name.to_string(),
            name_to_try: handle.canonical_name().to_string(),
        });
    }

    Ok(handle)
}

/// Parses a folder name, expecting the preferred name of the current user.
///
/// The preferred name lists the current user first among the writers. Public folders can be
/// parsed without being logged in.
pub async fn parse_handle_preferred(
    ctx: &RequestContext,
    services: &IdentityServices,
    id_getter: Option<&Arc<dyn IdGetter>>,
    offline_status: Option<&Arc<dyn OfflineStatusGetter>>,
    name: &str,
    tlf_type: TlfType,
) -> Result<Handle, HandleError> {
    let (handle, _) =
        parse_handle_loose(ctx, services, id_getter, offline_status, name, tlf_type).await?;

    let session = current_session_if_possible(
        ctx,
        services.sessions.as_ref(),
        handle.tlf_type() == TlfType::Public,
    )
    .await?;
    let preferred = handle.preferred_format(session.as_ref().map(|session| &session.name))?;

    if preferred.as_str() != name {
        return Err(HandleError::NameNotCanonical {
            name: name.to_string(),
            name_to_try: preferred.to_string(),
        });
    }

    Ok(handle)
}

/// Like [`parse_handle_preferred`], but never looks up implicit teams or folder ids.
pub async fn parse_handle_preferred_quick(
    ctx: &RequestContext,
    services: &IdentityServices,
    offline_status: Option<&Arc<dyn OfflineStatusGetter>>,
    name: &str,
    tlf_type: TlfType,
) -> Result<Handle, HandleError> {
    let services = services.with_resolver(Arc::new(NoImplicitTeamResolver::new(
        services.resolver.clone(),
    )));
    parse_handle_preferred(ctx, &services, None, offline_status, name, tlf_type).await
}

/// Rebuilds a handle from a persisted bare handle.
pub async fn make_handle(
    ctx: &RequestContext,
    bare: &BareHandle,
    tlf_type: TlfType,
    resolver: Arc<dyn Resolver>,
    usernames: Arc<dyn NormalizedUsernameGetter>,
    id_getter: Option<&Arc<dyn IdGetter>>,
    offline: OfflineAvailability,
) -> Result<Handle, HandleError> {
    let resolvable_id = |id| {
        ResolvableUser::Id(ResolvableId {
            id,
            tlf_type,
            resolver: resolver.clone(),
            usernames: usernames.clone(),
            id_getter: id_getter.cloned(),
            offline,
        })
    };

    let writers = bare
        .writers()
        .iter()
        .map(|id| resolvable_id(*id))
        .chain(
            bare.unresolved_writers()
                .iter()
                .map(|assertion| ResolvableUser::SocialAssertion(assertion.clone())),
        )
        .collect();

    let readers = if bare.tlf_type() == TlfType::Private {
        bare.readers()
            .iter()
            .map(|id| resolvable_id(*id))
            .chain(
                bare.unresolved_readers()
                    .iter()
                    .map(|assertion| ResolvableUser::SocialAssertion(assertion.clone())),
            )
            .collect()
    } else {
        Vec::new()
    };

    let handle =
        make_handle_helper(ctx, tlf_type, writers, readers, bare.extensions(), id_getter).await?;

    if &handle.to_bare_handle()? != bare {
        return Err(InternalError::BareHandleMismatch.into());
    }

    Ok(handle)
}

/// Rebuilds a handle from a persisted bare handle of a known folder.
pub async fn make_handle_with_tlf_id(
    ctx: &RequestContext,
    bare: &BareHandle,
    tlf_type: TlfType,
    resolver: Arc<dyn Resolver>,
    usernames: Arc<dyn NormalizedUsernameGetter>,
    tlf_id: TlfId,
    offline: OfflineAvailability,
) -> Result<Handle, HandleError> {
    let id_getter: Arc<dyn IdGetter> = Arc::new(ConstIdGetter {
        tlf_id: Some(tlf_id),
    });
    let mut handle = make_handle(
        ctx,
        bare,
        tlf_type,
        resolver,
        usernames,
        Some(&id_getter),
        offline,
    )
    .await?;

    if handle.tlf_id().is_none() {
        handle.set_tlf_id(Some(tlf_id));
    }

    Ok(handle)
}

/// Current session, or `None` if nobody is logged in and no session is required.
pub async fn current_session_if_possible(
    ctx: &RequestContext,
    sessions: &dyn SessionGetter,
    session_not_required: bool,
) -> Result<Option<Session>, HandleError> {
    match sessions.current_session(ctx).await {
        Ok(session) => Ok(Some(session)),
        Err(IdentityError::LoggedOut) if session_not_required => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Resolves a name without insisting on its canonical form.
///
/// Returns whether any typed assertion resolved to a different name, in which case the
/// handle was identified already and callers need to redirect.
async fn parse_handle_loose(
    ctx: &RequestContext,
    services: &IdentityServices,
    id_getter: Option<&Arc<dyn IdGetter>>,
    offline_status: Option<&Arc<dyn OfflineStatusGetter>>,
    name: &str,
    tlf_type: TlfType,
) -> Result<(Handle, bool), HandleError> {
    let split = split_and_normalize_tlf_name(name, tlf_type)?;
    let extensions = parse_extension_suffix(&split.extension_suffix)?;

    // The service is always asked with the normalized name, so it can use its cache.
    let (offline, service_name) = match offline_status {
        Some(status) => {
            let (normalized, _) = normalize_names_in_tlf(
                &split.writers,
                &split.readers,
                &split.extension_suffix,
                tlf_type,
            )?;
            let offline = status
                .offline_availability_for_path(&build_canonical_path(tlf_type, &normalized));
            (offline, normalized)
        }
        None => (OfflineAvailability::None, name.to_string()),
    };

    // A folder of users might be backed by an implicit team already.
    let mut iteam_handle = None;
    if tlf_type != TlfType::SingleTeam && ctx.resolve_implicit_teams() {
        match parse_implicit_team(
            ctx,
            services,
            id_getter,
            &service_name,
            tlf_type,
            &extensions,
            offline,
        )
        .await
        {
            Ok(mut handle) if handle.tlf_id().is_some() => {
                let (_, finalized_info) = sort_and_splat_extensions(extensions.clone())?;
                if let (None, Some(id_getter)) = (finalized_info, id_getter) {
                    // The team might still point at a folder which was reset since.
                    if !id_getter
                        .validate_latest_handle_not_final(ctx, &handle)
                        .await?
                    {
                        debug!(%name, "implicit team folder was finalized, ignoring its id");
                        handle.set_tlf_id(None);
                    }
                }
                if handle.tlf_id().is_some() {
                    return Ok((handle, false));
                }
                iteam_handle = Some(handle);
            }
            Ok(handle) => iteam_handle = Some(handle),
            Err(err) if err.is_canceled() || err.is_fatal() => return Err(err),
            Err(err) => debug!(%name, %err, "folder is not backed by an implicit team"),
        }
    }

    let changed = Arc::new(AtomicBool::new(false));
    let resolvable_assertion = |assertion: String| {
        ResolvableUser::Assertion(ResolvableAssertion {
            assertion,
            must_be_user: None,
            resolver: services.resolver.clone(),
            identifier: Some(services.identifier.clone()),
            id_getter: id_getter.cloned(),
            offline,
            changed: Some(changed.clone()),
        })
    };

    let writers = split
        .writers
        .iter()
        .map(|writer| {
            if tlf_type == TlfType::SingleTeam {
                resolvable_assertion(format!("{TEAM_ASSERTION_PREFIX}{writer}"))
            } else {
                resolvable_assertion(writer.clone())
            }
        })
        .collect();
    let readers = split
        .readers
        .iter()
        .map(|reader| resolvable_assertion(reader.clone()))
        .collect();

    let mut handle =
        make_handle_helper(ctx, tlf_type, writers, readers, extensions, id_getter).await?;

    if handle.tlf_id().is_none() {
        if let Some(iteam_handle) = iteam_handle {
            return Ok((iteam_handle, false));
        }
    }

    if tlf_type == TlfType::Private {
        let session = services.sessions.current_session(ctx).await?;
        handle.check_read_access(session.uid, &session.name)?;
    }

    if !split.extension_suffix.is_empty() {
        // Quick parses can't tell whether a folder is backed by a team, so an explicitly
        // typed first number is kept. Otherwise quick and full parses redirect to each other.
        let team_format =
            handle.is_backed_by_team() || split.extension_suffix.contains("#1)");
        let canonical_suffix = format_extensions(&handle.extensions(), team_format);
        let (members, _) = split_extension(handle.canonical_name().as_str());
        let canonical_name =
            CanonicalName::from(format!("{members}{EXTENSION_SEPARATOR}{canonical_suffix}"));
        handle.set_name(canonical_name);

        if canonical_suffix != split.extension_suffix {
            return Err(HandleError::NameNotCanonical {
                name: name.to_string(),
                name_to_try: handle.canonical_name().to_string(),
            });
        }
    }

    if !changed.load(Ordering::Acquire) {
        return Ok((handle, false));
    }

    debug!(%name, canonical = %handle.canonical_name(), "identifying changed folder name");
    identify_handle(ctx, services, offline_status, &handle).await?;

    Ok((handle, true))
}

async fn parse_implicit_team(
    ctx: &RequestContext,
    services: &IdentityServices,
    id_getter: Option<&Arc<dyn IdGetter>>,
    name: &str,
    tlf_type: TlfType,
    extensions: &[HandleExtension],
    offline: OfflineAvailability,
) -> Result<Handle, HandleError> {
    // Local conflicts are not part of the team name, they only exist on this device.
    let (iteam_name, iteam_extensions) = if contains_local_conflict_prefix(name) {
        (split_extension(name).0, extensions.to_vec())
    } else {
        (name, Vec::new())
    };

    let team = ResolvableUser::ImplicitTeam(ResolvableImplicitTeam {
        name: iteam_name.to_string(),
        tlf_type,
        resolver: services.resolver.clone(),
        offline,
    });
    make_handle_helper(ctx, tlf_type, vec![team], Vec::new(), iteam_extensions, id_getter).await
}
