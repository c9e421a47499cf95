//! HTTP inbound adapter: handlers, session helpers, and error mapping.

pub mod claims;
mod error;
pub mod health;
pub mod identity;
pub mod session;
pub mod state;
#[cfg(test)]
pub(crate) mod test_utils;

pub use error::ApiResult;
pub use state::HttpState;
