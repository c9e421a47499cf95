//! Payment-provider adapters.

mod http_minter;

pub use http_minter::{HttpRemoteMinter, PaymentApiConfig};
