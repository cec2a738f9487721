//! Small helpers shared by the rest of the crate.

pub mod bind_merge;
pub mod error_scope;
pub mod typedefs;
