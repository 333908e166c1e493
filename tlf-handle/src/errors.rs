// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors of handle resolution.
use std::fmt;

use thiserror::Error;
use tlf_core::{
    BareHandleError, CanonicalName, ExtensionError, HandleExtension, NameError,
    NormalizedUsername, TlfId, TlfType, UserOrTeamId,
};

/// Errors reported by identity services.
#[derive(Clone, Debug, Error)]
pub enum IdentityError {
    #[error("{0} is not a valid user")]
    NoSuchUser(String),

    #[error("team {0} does not exist")]
    NoSuchTeam(String),

    #[error("{0} is not a social assertion")]
    NotSocialAssertion(String),

    /// The identity has broken proofs or the remote tracking statement does not match.
    #[error("identify of {assertion} failed: {reason}")]
    IdentifyFailed { assertion: String, reason: String },

    #[error("not logged in")]
    LoggedOut,

    #[error("request was canceled")]
    Canceled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("identity service failure: {0}")]
    Service(String),
}

/// Errors of resolving, comparing and parsing folder handles.
#[derive(Clone, Debug, Error)]
pub enum HandleError {
    /// The folder exists under a different name. Callers are expected to retry with
    /// `name_to_try`.
    #[error("{name} is not the canonical name for this folder, try {name_to_try}")]
    NameNotCanonical { name: String, name_to_try: String },

    #[error("{0} is not a valid username")]
    NoSuchUser(String),

    #[error("team {0} does not exist")]
    NoSuchTeam(String),

    #[error("{0} is not a valid folder name")]
    NoSuchName(String),

    #[error("{0} is not a valid name or assertion")]
    BadName(String),

    #[error("{tlf_type} folder can not have readers")]
    ReadersNotAllowed { tlf_type: TlfType },

    #[error("team folder must have exactly one writer, got {0}")]
    InvalidTeamWriters(usize),

    #[error("{user} does not have read access to directory {path}")]
    ReadAccess {
        user: NormalizedUsername,
        name: CanonicalName,
        tlf_type: TlfType,
        path: String,
    },

    #[error("{user} does not have write access to directory {path}")]
    WriteAccess {
        user: NormalizedUsername,
        name: CanonicalName,
        tlf_type: TlfType,
        path: String,
    },

    #[error(
        "Folder handle extension mismatch, expected: {expected}, actual: {}",
        DisplayExtension(.actual)
    )]
    HandleExtensionMismatch {
        expected: HandleExtension,
        actual: Option<HandleExtension>,
    },

    #[error("folder handle is finalized")]
    HandleFinalized,

    #[error("can not migrate a finalized folder")]
    FinalizedMigration,

    #[error("can not transition between conflict and local conflict")]
    ConflictTransition,

    #[error("folder handle mismatch at revision {revision} for {path} ({tlf_id:?}): {message}")]
    HandleMismatch {
        revision: u64,
        path: String,
        tlf_id: Option<TlfId>,
        message: String,
    },

    /// An AND assertion resolved to a different identity than its identify.
    #[error("resolved {assertion} to {resolved}, but identify returned {identified}")]
    AssertionMismatch {
        assertion: String,
        resolved: NormalizedUsername,
        identified: NormalizedUsername,
    },

    /// Identify found broken proofs and the identify behavior does not tolerate them.
    #[error("identify of {name} found {count} broken proofs")]
    IdentifyBroken { name: NormalizedUsername, count: usize },

    #[error(transparent)]
    Identity(IdentityError),

    #[error("request was canceled")]
    Canceled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// Violated internal invariant, retrying will not help.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl HandleError {
    /// Returns true if the caller should retry under a different name.
    pub fn is_redirect(&self) -> bool {
        matches!(self, HandleError::NameNotCanonical { .. })
    }

    /// Name to retry with, if this is a redirect.
    pub fn name_to_try(&self) -> Option<&str> {
        match self {
            HandleError::NameNotCanonical { name_to_try, .. } => Some(name_to_try),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, HandleError::Internal(_))
    }

    /// Returns true if the request ended because of cancellation or its deadline.
    pub fn is_canceled(&self) -> bool {
        matches!(self, HandleError::Canceled | HandleError::DeadlineExceeded)
    }
}

/// Violated invariants which indicate bugs or corrupted state.
#[derive(Clone, Debug, Error)]
pub enum InternalError {
    #[error("more than one folder id was resolved, second one is {0}")]
    MultipleTlfIds(TlfId),

    #[error("folder id type {actual} does not match handle type {expected}")]
    TlfIdTypeMismatch { expected: TlfType, actual: TlfType },

    #[error("implicit team id {actual} does not match requested id {expected}")]
    ImplicitTeamIdMismatch {
        expected: UserOrTeamId,
        actual: UserOrTeamId,
    },

    #[error("rebuilt bare handle does not match the original one")]
    BareHandleMismatch,

    #[error("invalid bare handle: {0}")]
    InvalidBareHandle(String),

    #[error("can not resolve the AND assertion {0} without an identifier")]
    MissingIdentifier(String),

    #[error("access checks are not supported for team keyed folders")]
    TeamKeyedAccessCheck,

    #[error("all resolution tasks exited before reporting a result")]
    ResolutionAborted,

    #[error("identify break channel closed early")]
    BreakChannelClosed,

    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl From<IdentityError> for HandleError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::NoSuchUser(input) => HandleError::NoSuchUser(input),
            IdentityError::NoSuchTeam(input) => HandleError::NoSuchTeam(input),
            IdentityError::Canceled => HandleError::Canceled,
            IdentityError::DeadlineExceeded => HandleError::DeadlineExceeded,
            err => HandleError::Identity(err),
        }
    }
}

impl From<NameError> for HandleError {
    fn from(value: NameError) -> Self {
        match value {
            NameError::NotCanonical { name, name_to_try } => {
                HandleError::NameNotCanonical { name, name_to_try }
            }
            NameError::NoSuchName(name) | NameError::NoWriters(name) => {
                HandleError::NoSuchName(name)
            }
            NameError::NoSuchUser(name) => HandleError::NoSuchUser(name),
            NameError::BadName(name) | NameError::SocialAssertionInTeam(name) => {
                HandleError::BadName(name)
            }
            NameError::Extension(err) => err.into(),
        }
    }
}

impl From<ExtensionError> for HandleError {
    fn from(value: ExtensionError) -> Self {
        HandleError::BadName(value.to_string())
    }
}

impl From<BareHandleError> for HandleError {
    fn from(value: BareHandleError) -> Self {
        InternalError::InvalidBareHandle(value.to_string()).into()
    }
}

struct DisplayExtension<'a>(&'a Option<HandleExtension>);

impl fmt::Display for DisplayExtension<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(extension) => write!(f, "{extension}"),
            None => f.write_str("<nil>"),
        }
    }
}
