//! Access groups: the entity, its IP ranges and its persistence.

pub mod ip_range;
pub mod models;
pub mod queries;
pub mod store;

pub use ip_range::{matches, parse_ranges, IpRange};
pub use models::{AccessGroup, GroupId};
pub use queries::PgGroupStore;
pub use store::{GroupStore, MemoryGroupStore};
