//! open-beastx-core: Beast X vendor HID protocol, device session, and
//! configuration persistence.
//!
//! This crate provides the cross-platform core logic for configuring the
//! WL Mouse Beast X over its vendor-specific USB HID interface.

pub mod config;
pub mod device;
pub mod error;
#[cfg(test)]
mod integration_tests;
pub mod reconcile;
pub mod report;
pub mod safety;
pub mod session;
pub mod transport;

/// WL Mouse USB Vendor ID.
pub const BEASTX_VID: u16 = 0x36A7;

/// Beast X USB Product ID.
pub const BEASTX_PID: u16 = 0xA887;
