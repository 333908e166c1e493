// SPDX-License-Identifier: MIT OR Apache-2.0

use tokio::time::Duration;

use crate::identify::IdentifyBehavior;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration parameters for resolving folder handles.
#[derive(Clone, Debug)]
pub struct HandleConfiguration {
    /// Maximum duration of a single resolution request (`None` means no deadline).
    ///
    /// Default: 60 seconds.
    pub(crate) request_timeout: Option<Duration>,

    /// How identify failures are treated.
    ///
    /// Default: `IdentifyBehavior::DefaultKbfs`.
    pub(crate) identify_behavior: IdentifyBehavior,

    /// Try to resolve folders of users to the implicit team backing them first.
    ///
    /// Default: true.
    pub(crate) resolve_implicit_teams: bool,
}

impl HandleConfiguration {
    /// Return a default instance of `HandleConfiguration`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Define the maximum number of seconds a resolution request may take.
    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = Some(Duration::from_secs(seconds));
        self
    }

    /// Let resolution requests run until they finish or get canceled.
    pub fn no_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    pub fn identify_behavior(mut self, behavior: IdentifyBehavior) -> Self {
        self.identify_behavior = behavior;
        self
    }

    /// Enable or disable looking up implicit teams when parsing folder names.
    pub fn resolve_implicit_teams(mut self, enabled: bool) -> Self {
        self.resolve_implicit_teams = enabled;
        self
    }
}

impl Default for HandleConfiguration {
    fn default() -> Self {
        HandleConfiguration {
            request_timeout: Some(REQUEST_TIMEOUT),
            identify_behavior: IdentifyBehavior::default(),
            resolve_implicit_teams: true,
        }
    }
}
