// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use tlf_core::{NormalizedUsername, UserOrTeamId};

use crate::context::RequestContext;
use crate::errors::IdentityError;
use crate::traits::OfflineAvailability;

/// Looks up the current name of a user or team.
#[async_trait]
pub trait NormalizedUsernameGetter: Send + Sync {
    async fn get_normalized_username(
        &self,
        ctx: &RequestContext,
        id: UserOrTeamId,
        offline: OfflineAvailability,
    ) -> Result<NormalizedUsername, IdentityError>;
}
