// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use tlf_core::{NormalizedUsername, TlfType, UserOrTeamId};

use crate::context::RequestContext;
use crate::errors::IdentityError;
use crate::traits::{ImplicitTeamInfo, OfflineAvailability};

/// Outcome of verifying the proofs of an identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifyResult {
    pub name: NormalizedUsername,
    pub id: UserOrTeamId,

    /// Descriptions of proofs which failed verification.
    pub broken_proofs: Vec<String>,
}

/// Verifies identities and their proofs.
#[async_trait]
pub trait Identifier: Send + Sync {
    /// Identifies the user behind an assertion. The reason is shown to the user if the identify
    /// needs their attention.
    async fn identify(
        &self,
        ctx: &RequestContext,
        assertion: &str,
        reason: &str,
        offline: OfflineAvailability,
    ) -> Result<IdentifyResult, IdentityError>;

    /// Identifies all members of an implicit team.
    async fn identify_implicit_team(
        &self,
        ctx: &RequestContext,
        assertions: &str,
        suffix: &str,
        tlf_type: TlfType,
        reason: &str,
        offline: OfflineAvailability,
    ) -> Result<ImplicitTeamInfo, IdentityError>;
}
