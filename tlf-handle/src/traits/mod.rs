// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the services a handle is resolved against.
mod identifier;
mod ids;
mod offline;
mod resolver;
mod session;
mod usernames;

pub use identifier::{Identifier, IdentifyResult};
pub use ids::IdGetter;
pub use offline::{OfflineAvailability, OfflineStatusGetter};
pub use resolver::{ImplicitTeamInfo, Resolver};
pub use session::{Session, SessionGetter};
pub use usernames::NormalizedUsernameGetter;
