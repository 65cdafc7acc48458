//! Test utilities for the Omada response cache
//!
//! This crate provides fixtures and record builders shared by the
//! integration tests of the core library and the CLI.

pub mod builders;
pub mod fixture;

// Re-export commonly used types
pub use builders::{IdentityBuilder, ResponseBuilder};
pub use fixture::TestCache;
