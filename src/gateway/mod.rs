//! Ecowitt gateway integration module
//!
//! - `client`: HTTP fetch of `get_livedata_info`
//! - `livedata`: payload schema and humidity parsing

pub mod client;
pub mod livedata;

#[cfg(test)]
pub mod fake;

pub use client::{FetchOutcome, GatewayClient};
