//! Access resolution and group management.

pub mod bulk;
pub mod cache;
pub mod context;
pub mod decision;
pub mod handler;
pub mod snapshot;

pub use bulk::{BulkFailure, BulkOperation, BulkReport, GroupForm};
pub use cache::{DecisionKey, ResolutionCache};
pub use context::RequestContext;
pub use decision::{AccessDecision, DecisionReason};
pub use handler::AccessHandler;
pub use snapshot::GroupSnapshot;
