#![forbid(unsafe_code)]
#![doc = "Common error types, reason codes and protocol constants for polarssl-rs."]

pub mod codes;
pub mod constants;
pub mod error;

pub use constants::*;
pub use error::*;
