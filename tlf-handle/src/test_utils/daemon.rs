// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use tlf_core::{
    AssertionUrl, NormalizedUsername, SocialAssertion, TlfId, TlfType, UserOrTeamId,
    normalize_social_assertion_static, parse_assertion_expression,
};

use crate::context::RequestContext;
use crate::errors::{HandleError, IdentityError};
use crate::traits::{
    IdentifyResult, Identifier, ImplicitTeamInfo, NormalizedUsernameGetter, OfflineAvailability,
    Resolver, Session, SessionGetter,
};

use super::{make_test_team_id, make_test_tlf_id, make_test_uid};

#[derive(Debug, Default)]
struct State {
    current_user: Option<UserOrTeamId>,
    users: BTreeMap<UserOrTeamId, NormalizedUsername>,
    teams: BTreeMap<UserOrTeamId, (NormalizedUsername, Option<TlfId>)>,
    implicit_teams: HashMap<String, ImplicitTeamInfo>,
    asserts: HashMap<String, UserOrTeamId>,
    broken_proofs: HashMap<UserOrTeamId, Vec<String>>,
    next_id: u32,
    identify_calls: usize,
    best_effort_requests: usize,
}

/// Identity services backed by in-memory users and teams.
///
/// Every user is known by their name, teams by `name@team`. Implicit teams only exist after
/// being created with [`LocalDaemon::create_implicit_team`].
#[derive(Debug)]
pub struct LocalDaemon {
    state: Mutex<State>,
}

impl LocalDaemon {
    /// Creates users `u1`, `u2`, .. with ids `make_test_uid(1)`, `make_test_uid(2)`, ..
    pub fn new(current_user: &str, users: &[&str]) -> Self {
        let mut state = State::default();
        for (index, name) in users.iter().enumerate() {
            let uid = make_test_uid(index as u32 + 1);
            let name = NormalizedUsername::new(name);
            state.asserts.insert(name.to_string(), uid);
            state.users.insert(uid, name);
        }
        state.next_id = users.len() as u32 + 1;
        state.current_user = state
            .asserts
            .get(&NormalizedUsername::new(current_user).to_string())
            .copied();

        Self {
            state: Mutex::new(state),
        }
    }

    pub fn uid_of(&self, name: &str) -> UserOrTeamId {
        self.state.lock().unwrap().asserts[name]
    }

    pub fn set_logged_out(&self) {
        self.state.lock().unwrap().current_user = None;
    }

    /// Makes an assertion (for example `u1@twitter`) resolve to the given user.
    pub fn add_user_assertion(&self, name: &str, assertion: &str) {
        let mut state = self.state.lock().unwrap();
        let uid = state.asserts[name];
        let assertion = normalize_social_assertion_static(assertion)
            .map(|assertion| assertion.to_string())
            .unwrap_or_else(|| assertion.to_string());
        state.asserts.insert(assertion, uid);
    }

    /// Lets identifies of the user report the given broken proof.
    pub fn add_broken_proof(&self, name: &str, proof: &str) {
        let mut state = self.state.lock().unwrap();
        let uid = state.asserts[name];
        state
            .broken_proofs
            .entry(uid)
            .or_default()
            .push(proof.to_string());
    }

    pub fn add_team(&self, name: &str, public: bool) -> UserOrTeamId {
        let mut state = self.state.lock().unwrap();
        let tid = make_test_team_id(state.next_id, public);
        state.next_id += 1;
        state.asserts.insert(format!("{name}@team"), tid);
        state
            .teams
            .insert(tid, (NormalizedUsername::new(name), None));
        tid
    }

    /// Assigns a new folder id to a team.
    pub fn set_team_tlf_id(&self, tid: UserOrTeamId) -> TlfId {
        let mut state = self.state.lock().unwrap();
        let tlf_id = make_test_tlf_id(state.next_id, TlfType::SingleTeam);
        state.next_id += 1;
        if let Some((_, team_tlf_id)) = state.teams.get_mut(&tid) {
            *team_tlf_id = Some(tlf_id);
        }
        tlf_id
    }

    /// Creates the implicit team backing a folder of users.
    ///
    /// The team is named after the canonical member list and suffix. With `with_tlf_id` the
    /// team owns a folder already.
    pub fn create_implicit_team(
        &self,
        assertions: &str,
        suffix: &str,
        tlf_type: TlfType,
        with_tlf_id: bool,
    ) -> ImplicitTeamInfo {
        let mut state = self.state.lock().unwrap();
        let tid = make_test_team_id(state.next_id, tlf_type == TlfType::Public);
        let tlf_id = with_tlf_id.then(|| make_test_tlf_id(state.next_id, tlf_type));
        state.next_id += 1;

        let info = ImplicitTeamInfo {
            name: NormalizedUsername::new(&implicit_team_name(assertions, suffix)),
            tid,
            tlf_id,
        };
        state
            .implicit_teams
            .insert(implicit_team_key(assertions, suffix, tlf_type), info.clone());
        info
    }

    pub fn identify_calls(&self) -> usize {
        self.state.lock().unwrap().identify_calls
    }

    /// Number of requests which allowed cached answers.
    pub fn best_effort_requests(&self) -> usize {
        self.state.lock().unwrap().best_effort_requests
    }

    fn record_request(&self, offline: OfflineAvailability) {
        if offline == OfflineAvailability::BestEffort {
            self.state.lock().unwrap().best_effort_requests += 1;
        }
    }

    fn resolve_locked(
        state: &State,
        assertion: &str,
    ) -> Result<(NormalizedUsername, UserOrTeamId), IdentityError> {
        let urls = parse_assertion_expression(assertion)
            .map_err(|_| IdentityError::NoSuchUser(assertion.to_string()))?;

        let lookup = |key: String| {
            state
                .asserts
                .get(&key)
                .copied()
                .ok_or(IdentityError::NoSuchUser(key))
        };

        let mut resolved: Option<UserOrTeamId> = None;
        for url in urls {
            let id = match url {
                AssertionUrl::Uid(uid) => uid,
                AssertionUrl::Keybase(name) => lookup(name)?,
                AssertionUrl::Team(name) => lookup(format!("{name}@team"))?,
                AssertionUrl::Social(assertion) => lookup(assertion.to_string())?,
            };
            if resolved.is_some_and(|resolved| resolved != id) {
                return Err(IdentityError::Service(
                    "AND assertions resolve to different identities".into(),
                ));
            }
            resolved = Some(id);
        }

        let id = resolved.ok_or(IdentityError::NoSuchUser(assertion.to_string()))?;
        if id.is_user() {
            let name = state
                .users
                .get(&id)
                .ok_or(IdentityError::NoSuchUser(id.to_string()))?;
            return Ok((name.clone(), id));
        }

        let (name, _) = state
            .teams
            .get(&id)
            .ok_or(IdentityError::NoSuchTeam(id.to_string()))?;
        Ok((name.clone(), id))
    }

    fn implicit_team_locked(
        state: &State,
        assertions: &str,
        suffix: &str,
        tlf_type: TlfType,
    ) -> Result<ImplicitTeamInfo, IdentityError> {
        if tlf_type == TlfType::SingleTeam {
            return Err(IdentityError::Service(format!(
                "invalid implicit team folder type {tlf_type}"
            )));
        }
        state
            .implicit_teams
            .get(&implicit_team_key(assertions, suffix, tlf_type))
            .cloned()
            .ok_or_else(|| IdentityError::NoSuchTeam(implicit_team_name(assertions, suffix)))
    }
}

fn implicit_team_name(assertions: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        assertions.to_string()
    } else {
        format!("{assertions} {suffix}")
    }
}

fn implicit_team_key(assertions: &str, suffix: &str, tlf_type: TlfType) -> String {
    format!("{tlf_type}:{}", implicit_team_name(assertions, suffix))
}

fn check(ctx: &RequestContext) -> Result<(), IdentityError> {
    ctx.check().map_err(|err| match err {
        HandleError::DeadlineExceeded => IdentityError::DeadlineExceeded,
        _ => IdentityError::Canceled,
    })
}

#[async_trait]
impl Resolver for LocalDaemon {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        assertion: &str,
        offline: OfflineAvailability,
    ) -> Result<(NormalizedUsername, UserOrTeamId), IdentityError> {
        check(ctx)?;
        self.record_request(offline);
        Self::resolve_locked(&self.state.lock().unwrap(), assertion)
    }

    async fn resolve_implicit_team(
        &self,
        ctx: &RequestContext,
        assertions: &str,
        suffix: &str,
        tlf_type: TlfType,
        offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError> {
        check(ctx)?;
        self.record_request(offline);
        Self::implicit_team_locked(&self.state.lock().unwrap(), assertions, suffix, tlf_type)
    }

    async fn resolve_implicit_team_by_id(
        &self,
        ctx: &RequestContext,
        team_id: UserOrTeamId,
        _tlf_type: TlfType,
        offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError> {
        check(ctx)?;
        self.record_request(offline);
        self.state
            .lock()
            .unwrap()
            .implicit_teams
            .values()
            .find(|info| info.tid == team_id)
            .cloned()
            .ok_or(IdentityError::NoSuchTeam(team_id.to_string()))
    }

    async fn resolve_team_tlf_id(
        &self,
        ctx: &RequestContext,
        team_id: UserOrTeamId,
        offline: OfflineAvailability,
    ) -> Result<Option<TlfId>, IdentityError> {
        check(ctx)?;
        self.record_request(offline);
        let state = self.state.lock().unwrap();
        if let Some((_, tlf_id)) = state.teams.get(&team_id) {
            return Ok(*tlf_id);
        }
        state
            .implicit_teams
            .values()
            .find(|info| info.tid == team_id)
            .map(|info| info.tlf_id)
            .ok_or(IdentityError::NoSuchTeam(team_id.to_string()))
    }

    async fn normalize_social_assertion(
        &self,
        ctx: &RequestContext,
        assertion: &str,
    ) -> Result<SocialAssertion, IdentityError> {
        check(ctx)?;
        normalize_social_assertion_static(assertion)
            .ok_or(IdentityError::NotSocialAssertion(assertion.to_string()))
    }
}

#[async_trait]
impl Identifier for LocalDaemon {
    async fn identify(
        &self,
        ctx: &RequestContext,
        assertion: &str,
        _reason: &str,
        offline: OfflineAvailability,
    ) -> Result<IdentifyResult, IdentityError> {
        check(ctx)?;
        self.record_request(offline);
        let mut state = self.state.lock().unwrap();
        state.identify_calls += 1;
        let (name, id) = Self::resolve_locked(&state, assertion)?;
        Ok(IdentifyResult {
            name,
            id,
            broken_proofs: state.broken_proofs.get(&id).cloned().unwrap_or_default(),
        })
    }

    async fn identify_implicit_team(
        &self,
        ctx: &RequestContext,
        assertions: &str,
        suffix: &str,
        tlf_type: TlfType,
        _reason: &str,
        offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError> {
        check(ctx)?;
        self.record_request(offline);
        Self::implicit_team_locked(&self.state.lock().unwrap(), assertions, suffix, tlf_type)
    }
}

#[async_trait]
impl NormalizedUsernameGetter for LocalDaemon {
    async fn get_normalized_username(
        &self,
        ctx: &RequestContext,
        id: UserOrTeamId,
        offline: OfflineAvailability,
    ) -> Result<NormalizedUsername, IdentityError> {
        check(ctx)?;
        self.record_request(offline);
        let state = self.state.lock().unwrap();
        if let Some(name) = state.users.get(&id) {
            return Ok(name.clone());
        }
        if let Some((name, _)) = state.teams.get(&id) {
            return Ok(name.clone());
        }
        state
            .implicit_teams
            .values()
            .find(|info| info.tid == id)
            .map(|info| info.name.clone())
            .ok_or(IdentityError::NoSuchUser(id.to_string()))
    }
}

#[async_trait]
impl SessionGetter for LocalDaemon {
    async fn current_session(&self, ctx: &RequestContext) -> Result<Session, IdentityError> {
        check(ctx)?;
        let state = self.state.lock().unwrap();
        let uid = state.current_user.ok_or(IdentityError::LoggedOut)?;
        Ok(Session {
            uid,
            name: state.users[&uid].clone(),
        })
    }
}
