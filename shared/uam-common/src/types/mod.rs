//! Shared Types

pub mod access;
pub mod object;
pub mod requester;

pub use access::*;
pub use object::*;
pub use requester::*;
