// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of top-level folder (TLF) names into canonical handles.
//!
//! A folder name like `alice,bob@twitter#carol` lists the identities allowed to write to and
//! read from a folder. Every member is resolved concurrently against identity services,
//! producing a [`Handle`] with resolved identities, unresolved social assertions, extension
//! markers and a canonical name. Names which are not written canonically result in a
//! [`HandleError::NameNotCanonical`] redirect carrying the name to retry with.
//!
//! Identity services are abstracted behind the [`Resolver`], [`Identifier`],
//! [`NormalizedUsernameGetter`], [`SessionGetter`] and [`IdGetter`] traits. Every operation
//! takes a [`RequestContext`] which carries cancellation, the request deadline and the
//! identify behavior of the caller.
//!
//! ## Example
//!
//! ```rust,ignore
//! let ctx = RequestContext::new(&HandleConfiguration::default());
//! let services = IdentityServices::new(daemon);
//!
//! let handle = match parse_handle(&ctx, &services, None, None, "bob,alice", TlfType::Private).await {
//!     Ok(handle) => handle,
//!     Err(err) if err.is_redirect() => {
//!         let name = err.name_to_try().unwrap();
//!         parse_handle(&ctx, &services, None, None, name, TlfType::Private).await?
//!     }
//!     Err(err) => return Err(err),
//! };
//! assert_eq!(handle.canonical_name().as_str(), "alice,bob");
//! ```
pub mod config;
pub mod context;
pub mod errors;
mod handle;
pub mod identify;
mod make;
mod parse;
mod resolvable;
mod resolves_to;
mod services;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;
pub mod traits;

pub use config::HandleConfiguration;
pub use context::RequestContext;
pub use errors::{HandleError, IdentityError, InternalError};
pub use handle::Handle;
pub use identify::{
    ExtendedIdentify, IdentifyBehavior, TlfBreak, UserBreak, identify_handle, identify_user_list,
};
pub use parse::{
    current_session_if_possible, make_handle, make_handle_with_tlf_id, parse_handle,
    parse_handle_preferred, parse_handle_preferred_quick,
};
pub use services::{ConstIdGetter, IdentityServices};
pub use traits::{
    IdGetter, Identifier, IdentifyResult, ImplicitTeamInfo, NormalizedUsernameGetter,
    OfflineAvailability, OfflineStatusGetter, Resolver, Session, SessionGetter,
};
