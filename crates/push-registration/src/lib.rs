//! Push token registration client.
//!
//! Obtains a push token for a platform-issued device token through three
//! backend calls: device check-in, installation identity, and token
//! registration. Results of each stage are cached and re-used until they
//! expire or a later stage fails.

mod client;
mod controller;
mod error;
mod executor;
mod fid;
pub mod stages;
mod transport;
mod types;

#[cfg(test)]
mod testing;

pub use client::RegistrationClient;
pub use controller::RegistrationController;
pub use error::{RegistrationError, StageError, TransportError};
pub use executor::RequestExecutor;
pub use fid::generate_fid;
pub use transport::{HttpRequest, ReqwestTransport, Transport};
pub use types::*;
