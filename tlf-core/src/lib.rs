// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline data types for naming top-level folders (TLFs).
//!
//! A folder is named by the identities allowed to access it, for example `alice,bob#carol`
//! for a private folder which `alice` and `bob` can write to and `carol` can read. This crate
//! contains everything needed to split, normalize and rebuild such names without talking to
//! an identity service:
//!
//! - [`UserOrTeamId`] and [`TlfId`] identifiers with their kind and type suffixes
//! - [`TlfType`] and [`KeyingType`] of a folder
//! - [`NormalizedUsername`] and [`SocialAssertion`] values
//! - [`HandleExtension`] markers for conflicted copies and finalized folders
//! - name splitting and normalization in [`name`]
//! - [`BareHandle`], the sparse serializable form of a resolved handle
//!
//! Resolving names against an identity service lives in the `tlf-handle` crate.
pub mod assertion;
pub mod bare;
pub mod cbor;
pub mod extension;
pub mod id;
pub mod name;
mod serde;
pub mod types;
pub mod username;

pub use assertion::{
    AssertionError, AssertionUrl, SocialAssertion, TEAM_ASSERTION_PREFIX,
    normalize_social_assertion_static, parse_assertion_expression,
};
pub use bare::{BareHandle, BareHandleError};
pub use extension::{
    ExtensionError, HandleExtension, HandleExtensionType, contains_local_conflict_prefix,
    format_extensions, parse_extension_suffix, sort_and_splat_extensions,
};
pub use id::{IdError, PUBLIC_UID, PUBLIC_UID_NAME, TlfId, UserOrTeamId};
pub use name::{
    CanonicalName, NameError, PreferredName, SplitName, build_canonical_path,
    canonical_to_preferred_name, check_handle_offline, make_canonical_name, split_extension,
    split_and_normalize_tlf_name, split_name,
};
pub use types::{KeyingType, TlfType};
pub use username::{NormalizedUsername, is_valid_username};
