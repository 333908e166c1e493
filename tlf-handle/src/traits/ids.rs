// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use tlf_core::TlfId;

use crate::context::RequestContext;
use crate::errors::HandleError;
use crate::handle::Handle;

/// Maps handles to the storage of their folders.
#[async_trait]
pub trait IdGetter: Send + Sync {
    /// Folder id for a handle, `None` if the folder does not exist yet.
    async fn get_id_for_handle(
        &self,
        ctx: &RequestContext,
        handle: &Handle,
    ) -> Result<Option<TlfId>, HandleError>;

    /// Returns false if the latest revision of the folder was finalized, in which case the id
    /// must not be used for a new handle anymore.
    async fn validate_latest_handle_not_final(
        &self,
        ctx: &RequestContext,
        handle: &Handle,
    ) -> Result<bool, HandleError>;
}
