// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory identity services and helpers for testing handle resolution.
#![allow(unused)]
mod daemon;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tlf_core::{TlfId, TlfType, UserOrTeamId};

use crate::context::RequestContext;
use crate::errors::HandleError;
use crate::handle::Handle;
use crate::traits::{IdGetter, OfflineAvailability, OfflineStatusGetter};

pub use daemon::LocalDaemon;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

fn prefix(n: u32) -> [u8; 15] {
    let mut prefix = [0; 15];
    prefix[11..].copy_from_slice(&n.to_be_bytes());
    prefix
}

/// Deterministic user id for tests.
pub fn make_test_uid(n: u32) -> UserOrTeamId {
    UserOrTeamId::user(prefix(n))
}

/// Deterministic team id for tests.
pub fn make_test_team_id(n: u32, public: bool) -> UserOrTeamId {
    UserOrTeamId::team(prefix(n), public)
}

/// Deterministic folder id for tests.
pub fn make_test_tlf_id(n: u32, tlf_type: TlfType) -> TlfId {
    TlfId::new(prefix(n), tlf_type)
}

/// Folder ids registered by canonical path.
#[derive(Debug, Default)]
pub struct MemoryIdGetter {
    ids: Mutex<BTreeMap<String, TlfId>>,
    finalized: Mutex<BTreeSet<TlfId>>,
    lookups: Mutex<usize>,
}

impl MemoryIdGetter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a folder under its canonical path, for example `/keybase/private/u1,u2`.
    pub fn insert(&self, path: &str, tlf_id: TlfId) {
        self.ids.lock().unwrap().insert(path.to_string(), tlf_id);
    }

    /// Marks the latest revision of a folder as finalized.
    pub fn finalize(&self, tlf_id: TlfId) {
        self.finalized.lock().unwrap().insert(tlf_id);
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl IdGetter for MemoryIdGetter {
    async fn get_id_for_handle(
        &self,
        ctx: &RequestContext,
        handle: &Handle,
    ) -> Result<Option<TlfId>, HandleError> {
        ctx.check()?;
        *self.lookups.lock().unwrap() += 1;
        Ok(self
            .ids
            .lock()
            .unwrap()
            .get(&handle.canonical_path())
            .copied())
    }

    async fn validate_latest_handle_not_final(
        &self,
        ctx: &RequestContext,
        handle: &Handle,
    ) -> Result<bool, HandleError> {
        ctx.check()?;
        Ok(handle
            .tlf_id()
            .is_none_or(|tlf_id| !self.finalized.lock().unwrap().contains(&tlf_id)))
    }
}

/// Offline status with one answer for every folder, recording the requested paths.
#[derive(Debug, Default)]
pub struct FixedOfflineStatus {
    availability: OfflineAvailability,
    paths: Mutex<Vec<String>>,
}

impl FixedOfflineStatus {
    pub fn new(availability: OfflineAvailability) -> Self {
        Self {
            availability,
            paths: Mutex::default(),
        }
    }

    pub fn requested_paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl OfflineStatusGetter for FixedOfflineStatus {
    fn offline_availability_for_path(&self, path: &str) -> OfflineAvailability {
        self.paths.lock().unwrap().push(path.to_string());
        self.availability
    }

    fn offline_availability_for_id(&self, _tlf_id: Option<TlfId>) -> OfflineAvailability {
        self.availability
    }
}
