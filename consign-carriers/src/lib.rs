//! Carrier transport clients and service adapters.
//!
//! Each carrier gets a raw client (authenticated HTTP + response decoding) and a
//! service that implements [`consign_core::ShippingProvider`] on top of it,
//! translating the carrier's field names into the shared request/result types.

pub mod bluedart;
pub mod dates;
pub mod dhl;
pub mod http;

pub use bluedart::{BlueDartConfig, BlueDartService};
pub use dhl::{CredentialPlacement, DhlConfig, DhlService};

#[cfg(test)]
pub(crate) mod test_server;
