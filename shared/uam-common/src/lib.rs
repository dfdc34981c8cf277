//! User Access Manager Common Library
//!
//! Shared vocabulary used by the access engine and by hosting integrations:
//! object references, access modes and the requester context.

pub mod types;

pub use types::*;
