//! Validation of all write parameters against known-safe ranges before
//! anything is sent to the device.
//!
//! # Beast X Safety Bounds
//!
//! ## DPI
//! - **Range**: 50 – 26,000 DPI (PixArt PAW3395 sensor)
//! - **Step size**: 50 DPI increments
//! - **Default**: 800 DPI
//!
//! ## Polling Rate
//! - **Supported values**: 125, 250, 500, 1000, 2000, 4000 Hz
//! - **Default**: 1000 Hz
//! - **Encoding**: rate index 0–5 in the settings frame
//!
//! ## Lift-Off Distance
//! - **Supported values**: 1 mm, 2 mm
//! - **Encoding**: 0 = 1 mm, 1 = 2 mm
//!
//! ## DPI Profile Slots
//! - **Range**: 0–4 (fixed capacity of 5 slots)
//!
//! All validation happens BEFORE any HID communication; no invalid data
//! ever reaches the device, and a rejected value causes no partial write.

use crate::config::DPI_SLOT_COUNT;
use crate::device::{LiftOffDistance, PollingRate};
use crate::error::{Error, Result};

/// Beast X DPI constraints.
pub const DPI_MIN: u16 = 50;
pub const DPI_MAX: u16 = 26000;
pub const DPI_STEP: u16 = 50;

/// Validate a DPI value is within safe bounds and aligned to step size.
pub fn validate_dpi(dpi: u16) -> Result<u16> {
    if !(DPI_MIN..=DPI_MAX).contains(&dpi) {
        return Err(Error::OutOfRange {
            field: "dpi",
            value: dpi as u32,
            min: DPI_MIN as u32,
            max: DPI_MAX as u32,
        });
    }
    // Round to nearest step
    let rounded = ((dpi + DPI_STEP / 2) / DPI_STEP) * DPI_STEP;
    Ok(rounded.clamp(DPI_MIN, DPI_MAX))
}

/// Validate a raw Hz value against the enumerated polling rates.
pub fn validate_polling_rate(hz: u16) -> Result<PollingRate> {
    PollingRate::from_hz(hz).ok_or(Error::UnsupportedValue {
        field: "polling_rate",
        value: hz as u32,
    })
}

/// Validate a raw millimeter value against the enumerated lift-off distances.
pub fn validate_lift_off(mm: u8) -> Result<LiftOffDistance> {
    LiftOffDistance::from_mm(mm).ok_or(Error::UnsupportedValue {
        field: "lift_off",
        value: mm as u32,
    })
}

/// Validate a DPI profile slot index (0-based).
pub fn validate_slot(slot: usize) -> Result<()> {
    if slot >= DPI_SLOT_COUNT {
        return Err(Error::OutOfRange {
            field: "slot",
            value: slot as u32,
            min: 0,
            max: (DPI_SLOT_COUNT - 1) as u32,
        });
    }
    Ok(())
}
