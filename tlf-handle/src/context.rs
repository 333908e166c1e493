// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request state passed explicitly through every resolution call.
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::HandleConfiguration;
use crate::errors::HandleError;
use crate::identify::{ExtendedIdentify, IdentifyBehavior};

/// Cancellation scope, deadline and identify state of one resolution request.
///
/// Cloning a context shares its scope: canceling one clone cancels all of them. Use
/// [`RequestContext::child`] to open a sub-scope which can be canceled on its own.
#[derive(Clone, Debug)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    resolve_implicit_teams: bool,
    identify: ExtendedIdentify,
}

impl RequestContext {
    pub fn new(config: &HandleConfiguration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: config
                .request_timeout
                .map(|timeout| Instant::now() + timeout),
            resolve_implicit_teams: config.resolve_implicit_teams,
            identify: ExtendedIdentify::new(config.identify_behavior),
        }
    }

    /// Sub-scope which gets canceled with this context but can also be canceled on its own.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    /// Same scope with a fresh identify state.
    pub fn with_identify_behavior(&self, behavior: IdentifyBehavior) -> Self {
        Self {
            identify: ExtendedIdentify::new(behavior),
            ..self.clone()
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns an error if the request was canceled or ran past its deadline.
    pub fn check(&self) -> Result<(), HandleError> {
        if self.cancel.is_cancelled() {
            return Err(HandleError::Canceled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(HandleError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Completes when the request gets canceled or reaches its deadline.
    pub async fn done(&self) -> HandleError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => HandleError::Canceled,
                _ = tokio::time::sleep_until(deadline) => HandleError::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                HandleError::Canceled
            }
        }
    }

    pub fn resolve_implicit_teams(&self) -> bool {
        self.resolve_implicit_teams
    }

    pub fn identify(&self) -> &ExtendedIdentify {
        &self.identify
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(&HandleConfiguration::default())
    }
}
