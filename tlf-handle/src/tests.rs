// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use rstest::rstest;
use tlf_core::{BareHandle, HandleExtension, HandleExtensionType, KeyingType, TlfType};

use crate::config::HandleConfiguration;
use crate::context::RequestContext;
use crate::errors::{HandleError, IdentityError, InternalError};
use crate::handle::Handle;
use crate::parse::{
    make_handle, make_handle_with_tlf_id, parse_handle, parse_handle_preferred,
    parse_handle_preferred_quick,
};
use crate::services::IdentityServices;
use crate::test_utils::{
    FixedOfflineStatus, LocalDaemon, MemoryIdGetter, make_test_tlf_id, setup_logging,
};
use crate::traits::{IdGetter, OfflineAvailability, OfflineStatusGetter};

fn setup(current_user: &str) -> (Arc<LocalDaemon>, IdentityServices) {
    setup_logging();
    let daemon = Arc::new(LocalDaemon::new(current_user, &["u1", "u2", "u3"]));
    let services = IdentityServices::new(daemon.clone());
    (daemon, services)
}

async fn parse(
    services: &IdentityServices,
    name: &str,
    tlf_type: TlfType,
) -> Result<Handle, HandleError> {
    parse_handle(
        &RequestContext::default(),
        services,
        None,
        None,
        name,
        tlf_type,
    )
    .await
}

fn extension(ext_type: HandleExtensionType, number: u16) -> HandleExtension {
    HandleExtension::new(
        ext_type,
        number,
        None,
        Utc.with_ymd_and_hms(2016, 3, 14, 12, 0, 0).unwrap(),
    )
    .unwrap()
}

#[rstest]
#[case::private("u1,u2", TlfType::Private)]
#[case::private_with_reader("u1#u2", TlfType::Private)]
#[case::many_members("u1,u2,u3", TlfType::Private)]
#[case::public("u2,u3", TlfType::Public)]
#[case::unresolved("u1,u3@twitter", TlfType::Private)]
#[case::unresolved_reader("u1#u3@twitter", TlfType::Private)]
#[tokio::test]
async fn parse_canonical_names(#[case] name: &str, #[case] tlf_type: TlfType) {
    let (daemon, services) = setup("u1");

    let handle = parse(&services, name, tlf_type).await.unwrap();
    assert_eq!(handle.canonical_name().as_str(), name);
    assert_eq!(handle.tlf_type(), tlf_type);
    assert_eq!(handle.tlf_id(), None);
    assert!(!handle.is_backed_by_team());

    // Canonical names don't need to be identified.
    assert_eq!(daemon.identify_calls(), 0);
}

#[rstest]
#[case::unsorted("u2,u1", "u1,u2")]
#[case::uppercase("U1,u2", "u1,u2")]
#[case::unsorted_readers("u1#u3,u2", "u1#u2,u3")]
#[case::writer_as_reader("u1#u1", "u1")]
#[case::social_form("u1,twitter:u3", "u1,u3@twitter")]
#[tokio::test]
async fn parse_redirects_to_canonical_name(#[case] name: &str, #[case] name_to_try: &str) {
    let (_daemon, services) = setup("u1");

    let err = parse(&services, name, TlfType::Private).await.unwrap_err();
    assert!(err.is_redirect());
    assert_eq!(err.name_to_try(), Some(name_to_try));

    // Following the redirect succeeds.
    parse(&services, name_to_try, TlfType::Private)
        .await
        .unwrap();
}

#[tokio::test]
async fn resolved_social_assertion_redirects() {
    let (daemon, services) = setup("u1");

    let handle = parse(&services, "u1,u3@twitter", TlfType::Private)
        .await
        .unwrap();
    assert_eq!(handle.unresolved_writers().len(), 1);
    assert_eq!(handle.unresolved_writers()[0].to_string(), "u3@twitter");
    assert!(handle.has_unresolved());

    daemon.add_user_assertion("u3", "u3@twitter");

    let err = parse(&services, "u1,u3@twitter", TlfType::Private)
        .await
        .unwrap_err();
    assert_eq!(err.name_to_try(), Some("u1,u3"));

    // The changed name got identified before redirecting.
    assert_eq!(daemon.identify_calls(), 2);
}

#[tokio::test]
async fn uid_assertion() {
    let (daemon, services) = setup("u1");
    let name = format!("{}@uid", daemon.uid_of("u1"));

    let err = parse(&services, &name, TlfType::Private).await.unwrap_err();
    assert_eq!(err.name_to_try(), Some("u1"));
    assert_eq!(daemon.identify_calls(), 1);
}

#[tokio::test]
async fn and_assertions() {
    let (daemon, services) = setup("u1");
    daemon.add_user_assertion("u1", "u1@twitter");

    let err = parse(&services, "u1+u1@twitter", TlfType::Private)
        .await
        .unwrap_err();
    assert_eq!(err.name_to_try(), Some("u1"));

    // Once when resolving the expression, once for the changed name.
    assert_eq!(daemon.identify_calls(), 2);

    let err = parse(&services, "u1+u2", TlfType::Private)
        .await
        .unwrap_err();
    assert_matches!(err, HandleError::Identity(IdentityError::Service(_)));
}

#[tokio::test]
async fn duplicate_members_collapse() {
    let (daemon, services) = setup("u1");
    daemon.add_user_assertion("u1", "u1@twitter");

    let err = parse(&services, "u1,u1@twitter", TlfType::Private)
        .await
        .unwrap_err();
    assert_eq!(err.name_to_try(), Some("u1"));
}

#[rstest]
#[case::unknown_user("u1,u9", TlfType::Private, "u9")]
#[case::team_as_user("t1", TlfType::Private, "t1")]
#[case::user_as_team("u1", TlfType::SingleTeam, "u1@team")]
#[tokio::test]
async fn unknown_names(#[case] name: &str, #[case] tlf_type: TlfType, #[case] missing: &str) {
    let (daemon, services) = setup("u1");
    daemon.add_team("t1", false);

    assert_matches!(
        parse(&services, name, tlf_type).await,
        Err(HandleError::NoSuchUser(name)) if name == missing
    );
}

#[rstest]
#[case::public_readers("u1#u2", TlfType::Public)]
#[case::team_readers("t1#u2", TlfType::SingleTeam)]
#[case::two_teams("t1,t2", TlfType::SingleTeam)]
#[tokio::test]
async fn invalid_names(#[case] name: &str, #[case] tlf_type: TlfType) {
    let (_daemon, services) = setup("u1");

    assert_matches!(
        parse(&services, name, tlf_type).await,
        Err(HandleError::NoSuchName(_))
    );
}

#[tokio::test]
async fn private_folder_needs_read_access() {
    let (_daemon, services) = setup("u1");

    assert_matches!(
        parse(&services, "u2,u3", TlfType::Private).await,
        Err(HandleError::ReadAccess { path, .. }) if path == "/keybase/private/u2,u3"
    );

    // Public folders are readable by everyone.
    parse(&services, "u2,u3", TlfType::Public).await.unwrap();
}

#[tokio::test]
async fn logged_out() {
    let (daemon, services) = setup("u1");
    daemon.set_logged_out();

    assert_matches!(
        parse(&services, "u1,u2", TlfType::Private).await,
        Err(HandleError::Identity(IdentityError::LoggedOut))
    );

    let ctx = RequestContext::default();
    let handle =
        parse_handle_preferred(&ctx, &services, None, None, "u1,u2", TlfType::Public)
            .await
            .unwrap();
    assert_eq!(handle.canonical_name().as_str(), "u1,u2");
}

#[tokio::test]
async fn single_team() {
    let (daemon, services) = setup("u1");
    let tid = daemon.add_team("t1", false);
    let tlf_id = daemon.set_team_tlf_id(tid);
    let id_getter: Arc<dyn IdGetter> = Arc::new(MemoryIdGetter::new());
    let ctx = RequestContext::default();

    let handle = parse_handle(
        &ctx,
        &services,
        Some(&id_getter),
        None,
        "t1",
        TlfType::SingleTeam,
    )
    .await
    .unwrap();
    assert_eq!(handle.canonical_name().as_str(), "t1");
    assert_eq!(handle.tlf_id(), Some(tlf_id));
    assert_eq!(handle.first_resolved_writer(), Some(tid));
    assert_eq!(handle.type_for_keying(), KeyingType::Team);
    assert_eq!(handle.canonical_path(), "/keybase/team/t1");
}

#[tokio::test]
async fn multiple_folder_ids_are_fatal() {
    let (daemon, services) = setup("u1");
    for name in ["t1", "t2"] {
        let tid = daemon.add_team(name, false);
        daemon.set_team_tlf_id(tid);
    }
    let id_getter: Arc<dyn IdGetter> = Arc::new(MemoryIdGetter::new());

    let result = parse_handle(
        &RequestContext::default(),
        &services,
        Some(&id_getter),
        None,
        "t1@team,t2@team",
        TlfType::Private,
    )
    .await;
    assert_matches!(
        result,
        Err(HandleError::Internal(InternalError::MultipleTlfIds(_)))
    );
}

#[tokio::test]
async fn folder_ids_from_id_getter() {
    let (_daemon, services) = setup("u1");
    let tlf_id = make_test_tlf_id(100, TlfType::Private);
    let ids = Arc::new(MemoryIdGetter::new());
    ids.insert("/keybase/private/u1,u2", tlf_id);
    let id_getter: Arc<dyn IdGetter> = ids.clone();

    let handle = parse_handle(
        &RequestContext::default(),
        &services,
        Some(&id_getter),
        None,
        "u1,u2",
        TlfType::Private,
    )
    .await
    .unwrap();
    assert_eq!(handle.tlf_id(), Some(tlf_id));
    assert_eq!(ids.lookups(), 1);

    // Ids of the wrong folder type are rejected.
    ids.insert("/keybase/public/u1,u2", tlf_id);
    let result = parse_handle(
        &RequestContext::default(),
        &services,
        Some(&id_getter),
        None,
        "u1,u2",
        TlfType::Public,
    )
    .await;
    assert_matches!(
        result,
        Err(HandleError::Internal(InternalError::TlfIdTypeMismatch {
            expected: TlfType::Public,
            actual: TlfType::Private,
        }))
    );
}

#[tokio::test]
async fn conflict_extensions() {
    let (_daemon, services) = setup("u1");

    let handle = parse(
        &services,
        "u1,u2 (conflicted copy 2016-03-14 #2)",
        TlfType::Private,
    )
    .await
    .unwrap();
    assert!(handle.is_conflict());
    assert!(!handle.is_local_conflict());
    assert_eq!(
        handle.conflict_info(),
        Some(&extension(HandleExtensionType::Conflict, 2))
    );

    let handle = parse(
        &services,
        "u1,u2 (conflicted copy 2016-03-14)",
        TlfType::Private,
    )
    .await
    .unwrap();
    assert_eq!(
        handle.conflict_info(),
        Some(&extension(HandleExtensionType::Conflict, 1))
    );

    // An explicitly typed first number is kept.
    let handle = parse(
        &services,
        "u1,u2 (conflicted copy 2016-03-14 #1)",
        TlfType::Private,
    )
    .await
    .unwrap();
    assert_eq!(
        handle.canonical_name().as_str(),
        "u1,u2 (conflicted copy 2016-03-14 #1)"
    );
    assert_eq!(
        handle.conflict_info(),
        Some(&extension(HandleExtensionType::Conflict, 1))
    );

    let handle = parse(
        &services,
        "u1,u2 (conflicted copy 2016-03-14) (files before u3 account reset 2016-03-14 #3)",
        TlfType::Private,
    )
    .await
    .unwrap();
    assert!(handle.is_conflict());
    assert!(handle.is_final());
    assert_eq!(handle.extensions().len(), 2);

    assert_matches!(
        parse(&services, "u1,u2 (not an extension)", TlfType::Private).await,
        Err(HandleError::BadName(_))
    );
}

#[tokio::test]
async fn implicit_team_with_folder() {
    let (daemon, services) = setup("u1");
    let info = daemon.create_implicit_team("u1,u2", "", TlfType::Private, true);

    let handle = parse(&services, "u1,u2", TlfType::Private).await.unwrap();
    assert!(handle.is_backed_by_team());
    assert_eq!(handle.type_for_keying(), KeyingType::Team);
    assert_eq!(handle.tlf_id(), info.tlf_id);
    assert_eq!(handle.first_resolved_writer(), Some(info.tid));
    assert_eq!(handle.canonical_name().as_str(), "u1,u2");

    // Other folders are not affected.
    let handle = parse(&services, "u1,u3", TlfType::Private).await.unwrap();
    assert!(!handle.is_backed_by_team());
}

#[tokio::test]
async fn implicit_team_without_folder() {
    let (daemon, services) = setup("u1");
    let info = daemon.create_implicit_team("u1,u2", "", TlfType::Private, false);

    let handle = parse(&services, "u1,u2", TlfType::Private).await.unwrap();
    assert!(handle.is_backed_by_team());
    assert_eq!(handle.first_resolved_writer(), Some(info.tid));
    assert_eq!(handle.tlf_id(), None);

    // A folder of users which exists already takes precedence.
    let tlf_id = make_test_tlf_id(100, TlfType::Private);
    let ids = Arc::new(MemoryIdGetter::new());
    ids.insert("/keybase/private/u1,u2", tlf_id);
    let id_getter: Arc<dyn IdGetter> = ids;

    let handle = parse_handle(
        &RequestContext::default(),
        &services,
        Some(&id_getter),
        None,
        "u1,u2",
        TlfType::Private,
    )
    .await
    .unwrap();
    assert!(!handle.is_backed_by_team());
    assert_eq!(handle.tlf_id(), Some(tlf_id));
}

#[tokio::test]
async fn finalized_implicit_team_folder_is_ignored() {
    let (daemon, services) = setup("u1");
    let info = daemon.create_implicit_team("u1,u2", "", TlfType::Private, true);
    let ids = Arc::new(MemoryIdGetter::new());
    ids.finalize(info.tlf_id.unwrap());
    let id_getter: Arc<dyn IdGetter> = ids;

    let handle = parse_handle(
        &RequestContext::default(),
        &services,
        Some(&id_getter),
        None,
        "u1,u2",
        TlfType::Private,
    )
    .await
    .unwrap();
    assert!(handle.is_backed_by_team());
    assert_eq!(handle.tlf_id(), None);
}

#[tokio::test]
async fn finalized_name_keeps_implicit_team_folder() {
    let (daemon, services) = setup("u1");
    let suffix = "(files before u3 account reset 2016-03-14)";
    let info = daemon.create_implicit_team("u1,u2", suffix, TlfType::Private, true);
    let ids = Arc::new(MemoryIdGetter::new());
    ids.finalize(info.tlf_id.unwrap());
    let id_getter: Arc<dyn IdGetter> = ids;

    // The typed name is finalized already, so the finalized folder is the one asked for.
    let name = format!("u1,u2 {suffix}");
    let handle = parse_handle(
        &RequestContext::default(),
        &services,
        Some(&id_getter),
        None,
        &name,
        TlfType::Private,
    )
    .await
    .unwrap();
    assert!(handle.is_backed_by_team());
    assert_eq!(handle.canonical_name().as_str(), name);
    assert_eq!(handle.tlf_id(), info.tlf_id);
}

#[tokio::test]
async fn explicit_first_conflict_number_does_not_bounce() {
    let (daemon, services) = setup("u1");
    let suffix = "(conflicted copy 2016-03-14 #1)";
    let info = daemon.create_implicit_team("u1,u2", suffix, TlfType::Private, true);
    let ctx = RequestContext::default();
    let name = format!("u1,u2 {suffix}");

    let handle = parse(&services, &name, TlfType::Private).await.unwrap();
    assert!(handle.is_backed_by_team());
    assert_eq!(handle.tlf_id(), info.tlf_id);

    // Without implicit teams the folder looks like a folder of users, which keeps the number.
    let handle = parse_handle_preferred_quick(&ctx, &services, None, &name, TlfType::Private)
        .await
        .unwrap();
    assert!(!handle.is_backed_by_team());
    assert_eq!(handle.canonical_name().as_str(), name);
}

#[tokio::test]
async fn implicit_team_conflict() {
    let (daemon, services) = setup("u1");
    let suffix = "(conflicted copy 2016-03-14 #2)";
    let info = daemon.create_implicit_team("u1,u2", suffix, TlfType::Private, true);

    let name = format!("u1,u2 {suffix}");
    let handle = parse(&services, &name, TlfType::Private).await.unwrap();
    assert_eq!(handle.canonical_name().as_str(), name);
    assert_eq!(handle.tlf_id(), info.tlf_id);
}

#[tokio::test]
async fn implicit_teams_can_be_disabled() {
    let (daemon, services) = setup("u1");
    daemon.create_implicit_team("u1,u2", "", TlfType::Private, true);
    let ctx = RequestContext::new(&HandleConfiguration::new().resolve_implicit_teams(false));

    let handle = parse_handle(&ctx, &services, None, None, "u1,u2", TlfType::Private)
        .await
        .unwrap();
    assert!(!handle.is_backed_by_team());
}

#[tokio::test]
async fn preferred_names() {
    let (_daemon, services) = setup("u2");
    let ctx = RequestContext::default();

    let handle = parse_handle_preferred(&ctx, &services, None, None, "u2,u1", TlfType::Private)
        .await
        .unwrap();
    assert_eq!(handle.canonical_name().as_str(), "u1,u2");

    let err = parse_handle_preferred(&ctx, &services, None, None, "u1,u2", TlfType::Private)
        .await
        .unwrap_err();
    assert_eq!(err.name_to_try(), Some("u2,u1"));

    // Readers are never moved to the front.
    parse_handle_preferred(&ctx, &services, None, None, "u1#u2", TlfType::Private)
        .await
        .unwrap();
}

#[tokio::test]
async fn quick_parsing_skips_implicit_teams() {
    let (daemon, services) = setup("u1");
    daemon.create_implicit_team("u1,u2", "", TlfType::Private, true);

    let handle = parse_handle_preferred_quick(
        &RequestContext::default(),
        &services,
        None,
        "u1,u2",
        TlfType::Private,
    )
    .await
    .unwrap();
    assert!(!handle.is_backed_by_team());
    assert_eq!(handle.tlf_id(), None);
}

#[tokio::test]
async fn offline_availability() {
    let (daemon, services) = setup("u1");
    let status = Arc::new(FixedOfflineStatus::new(OfflineAvailability::BestEffort));
    let offline_status: Arc<dyn OfflineStatusGetter> = status.clone();

    parse_handle(
        &RequestContext::default(),
        &services,
        None,
        Some(&offline_status),
        "u1,u2",
        TlfType::Private,
    )
    .await
    .unwrap();

    assert_eq!(status.requested_paths(), vec!["/keybase/private/u1,u2"]);
    assert!(daemon.best_effort_requests() >= 2);
}

#[tokio::test]
async fn canceled_parse() {
    let (_daemon, services) = setup("u1");
    let ctx = RequestContext::default();
    ctx.cancel();

    let result = parse_handle(&ctx, &services, None, None, "u1,u2", TlfType::Private).await;
    assert_matches!(result, Err(HandleError::Canceled));
}

#[tokio::test]
async fn parse_after_deadline() {
    let (_daemon, services) = setup("u1");
    let ctx = RequestContext::new(&HandleConfiguration::new().request_timeout(0));

    let result = parse_handle(&ctx, &services, None, None, "u1,u2", TlfType::Private).await;
    assert_matches!(result, Err(HandleError::DeadlineExceeded));
}

#[tokio::test]
async fn make_handle_from_bare_handle() {
    let (_daemon, services) = setup("u1");
    let ctx = RequestContext::default();

    let handle = parse(&services, "u1,u3@twitter#u2", TlfType::Private)
        .await
        .unwrap();
    let bare = handle.to_bare_handle().unwrap();

    let rebuilt = make_handle(
        &ctx,
        &bare,
        TlfType::Private,
        services.resolver.clone(),
        services.usernames.clone(),
        None,
        OfflineAvailability::None,
    )
    .await
    .unwrap();
    assert_eq!(rebuilt, handle);

    let tlf_id = make_test_tlf_id(100, TlfType::Private);
    let rebuilt = make_handle_with_tlf_id(
        &ctx,
        &bare,
        TlfType::Private,
        services.resolver.clone(),
        services.usernames.clone(),
        tlf_id,
        OfflineAvailability::None,
    )
    .await
    .unwrap();
    assert_eq!(rebuilt.tlf_id(), Some(tlf_id));
    let mut expected = handle.clone();
    expected.set_tlf_id(Some(tlf_id));
    assert_eq!(rebuilt, expected);
}

#[tokio::test]
async fn make_implicit_team_handle_from_bare_handle() {
    let (daemon, services) = setup("u1");
    daemon.create_implicit_team("u1,u2", "", TlfType::Private, true);
    let ctx = RequestContext::default();

    let handle = parse(&services, "u1,u2", TlfType::Private).await.unwrap();
    let bare = handle.to_bare_handle().unwrap();

    let rebuilt = make_handle(
        &ctx,
        &bare,
        TlfType::Private,
        services.resolver.clone(),
        services.usernames.clone(),
        None,
        OfflineAvailability::None,
    )
    .await
    .unwrap();
    assert_eq!(rebuilt, handle);
}

#[tokio::test]
async fn make_regular_team_handle_from_bare_handle() {
    let (daemon, services) = setup("u1");
    let tid = daemon.add_team("t1", false);
    let bare = BareHandle::new(vec![tid], vec![], vec![], vec![], vec![]).unwrap();

    // The team isn't an implicit team, so it is resolved by its name instead.
    let handle = make_handle(
        &RequestContext::default(),
        &bare,
        TlfType::Private,
        services.resolver.clone(),
        services.usernames.clone(),
        None,
        OfflineAvailability::None,
    )
    .await
    .unwrap();
    assert_eq!(handle.canonical_name().as_str(), "t1");
    assert_eq!(handle.first_resolved_writer(), Some(tid));
    assert_eq!(handle.to_bare_handle().unwrap(), bare);

    // Cancellation still ends the lookup.
    let ctx = RequestContext::default();
    ctx.cancel();
    assert_matches!(
        make_handle(
            &ctx,
            &bare,
            TlfType::Private,
            services.resolver.clone(),
            services.usernames.clone(),
            None,
            OfflineAvailability::None,
        )
        .await,
        Err(HandleError::Canceled)
    );
}

#[tokio::test]
async fn resolve_again() {
    let (daemon, services) = setup("u1");
    let ctx = RequestContext::default();

    let handle = parse(&services, "u1,u3@twitter", TlfType::Private)
        .await
        .unwrap();

    // Nothing changed yet.
    let again = handle
        .resolve_again(&ctx, &services.resolver, None, None)
        .await
        .unwrap();
    assert_eq!(again, handle);

    daemon.add_user_assertion("u3", "u3@twitter");
    let again = handle
        .resolve_again(&ctx, &services.resolver, None, None)
        .await
        .unwrap();
    assert_eq!(again.canonical_name().as_str(), "u1,u3");
    assert!(!again.has_unresolved());

    // Only assertions of the given user get resolved.
    let again = handle
        .resolve_again_for_user(
            &ctx,
            &services.resolver,
            None,
            None,
            Some(daemon.uid_of("u2")),
        )
        .await
        .unwrap();
    assert_eq!(again.canonical_name().as_str(), "u1,u3@twitter");

    // Finalized handles stay as they are.
    let mut finalized = handle.clone();
    finalized.set_finalized_info(Some(extension(HandleExtensionType::Finalized, 1)));
    let again = finalized
        .resolve_again(&ctx, &services.resolver, None, None)
        .await
        .unwrap();
    assert_eq!(again, finalized);
}

#[rstest]
#[case::double_assertions("u1,u3@github,u3@twitter", "u1,u3")]
#[case::writer_reader("u1,u3@twitter#u3", "u1,u3")]
#[case::unresolved_reader("u1#u3@github,u3@twitter", "u1#u3")]
#[case::conflict(
    "u1,u3@twitter (conflicted copy 2016-03-14 #2)",
    "u1,u3 (conflicted copy 2016-03-14 #2)"
)]
#[tokio::test]
async fn resolve_again_collapses_members(#[case] name: &str, #[case] resolved: &str) {
    let (daemon, services) = setup("u1");
    let ctx = RequestContext::default();

    let handle = parse(&services, name, TlfType::Private).await.unwrap();
    assert_eq!(handle.canonical_name().as_str(), name);

    daemon.add_user_assertion("u3", "u3@twitter");
    daemon.add_user_assertion("u3", "u3@github");

    let again = handle
        .resolve_again(&ctx, &services.resolver, None, None)
        .await
        .unwrap();
    assert_eq!(again.canonical_name().as_str(), resolved);
    assert_eq!(again.conflict_info(), handle.conflict_info());
}

#[tokio::test]
async fn resolves_to_newer_handle() {
    let (daemon, services) = setup("u1");
    let ctx = RequestContext::default();

    let old = parse(&services, "u1,u3@twitter", TlfType::Private)
        .await
        .unwrap();
    daemon.add_user_assertion("u3", "u3@twitter");
    let new = parse(&services, "u1,u3", TlfType::Private).await.unwrap();

    let (resolves, partial) = old
        .resolves_to(&ctx, &services.resolver, None, None, &new)
        .await
        .unwrap();
    assert!(resolves);
    assert_eq!(partial, new);

    let (resolves, _) = new
        .resolves_to(&ctx, &services.resolver, None, None, &old)
        .await
        .unwrap();
    assert!(!resolves);

    // Assertions still unresolved in the other handle stay unresolved.
    let (resolves, partial) = old
        .resolves_to(&ctx, &services.resolver, None, None, &old)
        .await
        .unwrap();
    assert!(resolves);
    assert!(partial.has_unresolved());

    old.mutually_resolves_to(&ctx, &services.resolver, None, None, &new, 1, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn resolves_to_with_extensions() {
    let (_daemon, services) = setup("u1");
    let ctx = RequestContext::default();
    let handle = parse(&services, "u1,u2", TlfType::Private).await.unwrap();

    let conflicted = handle
        .with_updated_conflict_info(Some(extension(HandleExtensionType::Conflict, 1)))
        .unwrap();
    let (resolves, _) = handle
        .resolves_to(&ctx, &services.resolver, None, None, &conflicted)
        .await
        .unwrap();
    assert!(resolves);

    let mut finalized = handle.clone();
    finalized.set_finalized_info(Some(extension(HandleExtensionType::Finalized, 1)));
    let (resolves, _) = handle
        .resolves_to(&ctx, &services.resolver, None, None, &finalized)
        .await
        .unwrap();
    assert!(resolves);

    // A finalized folder can't become a conflict.
    assert_matches!(
        finalized
            .resolves_to(&ctx, &services.resolver, None, None, &conflicted)
            .await,
        Err(HandleError::HandleFinalized)
    );

    let local = handle
        .with_updated_conflict_info(Some(extension(HandleExtensionType::LocalConflict, 1)))
        .unwrap();
    assert_matches!(
        conflicted
            .resolves_to(&ctx, &services.resolver, None, None, &local)
            .await,
        Err(HandleError::ConflictTransition)
    );
}

#[tokio::test]
async fn resolves_to_implicit_team() {
    let (daemon, services) = setup("u1");
    let ctx = RequestContext::default();

    let users = parse(&services, "u1,u2", TlfType::Private).await.unwrap();
    daemon.create_implicit_team("u1,u2", "", TlfType::Private, false);
    let team = parse(&services, "u1,u2", TlfType::Private).await.unwrap();
    assert!(team.is_backed_by_team());

    let (resolves, _) = users
        .resolves_to(&ctx, &services.resolver, None, None, &team)
        .await
        .unwrap();
    assert!(resolves);

    // Teams with more or fewer members are different folders.
    for members in ["u1,u2,u3", "u1"] {
        daemon.create_implicit_team(members, "", TlfType::Private, false);
        let other_team = parse(&services, members, TlfType::Private).await.unwrap();
        assert!(other_team.is_backed_by_team());

        let (resolves, _) = users
            .resolves_to(&ctx, &services.resolver, None, None, &other_team)
            .await
            .unwrap();
        assert!(!resolves, "{members}");
    }

    // Public folders migrate the same way.
    let public_users = parse(&services, "u1,u2", TlfType::Public).await.unwrap();
    daemon.create_implicit_team("u1,u2", "", TlfType::Public, false);
    let public_team = parse(&services, "u1,u2", TlfType::Public).await.unwrap();
    assert!(public_team.is_backed_by_team());

    let (resolves, _) = public_users
        .resolves_to(&ctx, &services.resolver, None, None, &public_team)
        .await
        .unwrap();
    assert!(resolves);

    // Finalized folders are not migrated.
    let mut finalized = users.clone();
    finalized.set_finalized_info(Some(extension(HandleExtensionType::Finalized, 1)));
    assert_matches!(
        finalized
            .resolves_to(&ctx, &services.resolver, None, None, &team)
            .await,
        Err(HandleError::FinalizedMigration)
    );
}

#[tokio::test]
async fn mutually_resolves_to_mismatch() {
    let (_daemon, services) = setup("u1");
    let ctx = RequestContext::default();
    let tlf_id = make_test_tlf_id(100, TlfType::Private);

    let a = parse(&services, "u1,u2", TlfType::Private).await.unwrap();
    let b = parse(&services, "u1,u3", TlfType::Private).await.unwrap();

    let result = a
        .mutually_resolves_to(&ctx, &services.resolver, None, None, &b, 5, Some(tlf_id))
        .await;
    assert_matches!(
        result,
        Err(HandleError::HandleMismatch { revision: 5, path, tlf_id: Some(id), .. })
            if path == "/keybase/private/u1,u2" && id == tlf_id
    );
}
