//! Command-line runner for the push registration handshake.

pub mod config;
pub mod state;

pub use config::Config;
pub use state::StateFile;
