// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use tlf_core::{NormalizedUsername, UserOrTeamId};

use crate::context::RequestContext;
use crate::errors::IdentityError;

/// Logged-in user of this device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub uid: UserOrTeamId,
    pub name: NormalizedUsername,
}

#[async_trait]
pub trait SessionGetter: Send + Sync {
    /// Returns [`IdentityError::LoggedOut`] if nobody is logged in.
    async fn current_session(&self, ctx: &RequestContext) -> Result<Session, IdentityError>;
}
