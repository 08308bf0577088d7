//! OBD-II Protocol Implementation
//!
//! This crate provides async serial communication with ELM327-compatible
//! OBD-II adapters, plus a mock adapter for bench runs without a vehicle.

mod client;
mod error;
mod pid;
mod protocol;

pub use client::ObdClient;
pub use error::ObdError;
pub use pid::{decode_supported, Pid, PidResponse};
pub use protocol::ObdProtocol;

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Positive response offset added to the request mode
    pub const RESPONSE_OFFSET: u8 = 0x40;
}
