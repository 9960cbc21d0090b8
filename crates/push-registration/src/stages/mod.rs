//! Request builders and response parsers for the three handshake stages.

pub mod checkin;
pub mod installation;
pub mod registration;
