//! User Access Manager Engine
//!
//! Group-based access control for content objects. Objects, users and roles
//! are associated with named access groups; a requester may read or write an
//! object when it shares a group with it, when a group opens the object to
//! everyone, or when the requester's level grants full access.

pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod groups;
pub mod hierarchy;
pub mod observability;

pub use access::{
    AccessDecision, AccessHandler, BulkFailure, BulkOperation, BulkReport, DecisionReason,
    GroupForm, RequestContext,
};
pub use config::{AccessConfig, Config};
pub use error::{AccessError, AccessResult};
pub use groups::{AccessGroup, GroupId, GroupStore, IpRange, MemoryGroupStore, PgGroupStore};
pub use hierarchy::{HierarchyResolver, NoHierarchy, StaticHierarchy};
pub use uam_common::{AccessMode, AccessScope, ObjectRef, ObjectType, Requester};
