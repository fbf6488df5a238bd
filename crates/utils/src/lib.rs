//! Shared plumbing for the selscope crates.

pub mod errors;
