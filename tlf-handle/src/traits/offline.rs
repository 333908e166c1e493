// SPDX-License-Identifier: MIT OR Apache-2.0

use tlf_core::TlfId;

/// Whether lookups may be served from cached data when the network is unavailable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OfflineAvailability {
    #[default]
    None,

    /// Serve cached data if the service can't be reached.
    BestEffort,
}

/// Tells which folders are configured to be available offline.
pub trait OfflineStatusGetter: Send + Sync {
    fn offline_availability_for_path(&self, path: &str) -> OfflineAvailability;

    fn offline_availability_for_id(&self, tlf_id: Option<TlfId>) -> OfflineAvailability;
}
