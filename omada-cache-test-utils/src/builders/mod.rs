//! Builders for Omada-shaped records

mod identity;
mod response;

pub use identity::IdentityBuilder;
pub use response::ResponseBuilder;
