//! Actix middleware used by the HTTP surface.

pub mod trace;

pub use trace::{RequestId, RequestTrace};
