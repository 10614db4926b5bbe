//! Reconciliation of persisted configuration against live device state.
//!
//! Runs once per transition into Connected. The local file represents the
//! user's last confirmed intent; the device may have reset to firmware
//! defaults after a power cycle, so for every differing field the
//! persisted value wins and is re-sent to the device.

use crate::config::{DeviceConfig, DpiProfile};
use crate::device::{LiftOffDistance, PollingRate};
use crate::error::Result;
use crate::report::{self, REPORT_LEN};
use tracing::debug;

/// One corrective write the device needs to match persisted intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectiveWrite {
    PollingRate(PollingRate),
    LiftOff(LiftOffDistance),
    DpiProfile { slot: usize, profile: DpiProfile },
}

impl CorrectiveWrite {
    /// Encode this write as a vendor report.
    pub fn encode(&self) -> Result<[u8; REPORT_LEN]> {
        match self {
            Self::PollingRate(rate) => Ok(report::encode_polling_rate(*rate)),
            Self::LiftOff(distance) => Ok(report::encode_lift_off(*distance)),
            Self::DpiProfile { slot, profile } => report::encode_dpi_profile(*slot, profile),
        }
    }
}

/// Compute the corrective writes that bring `live` in line with
/// `persisted`.
///
/// The order is deterministic: polling rate, lift-off, then DPI slots in
/// ascending order. Fields that already match produce no write.
pub fn plan(persisted: &DeviceConfig, live: &DeviceConfig) -> Vec<CorrectiveWrite> {
    let mut writes = Vec::new();

    if persisted.polling_rate != live.polling_rate {
        debug!(
            persisted = persisted.polling_rate.as_hz(),
            live = live.polling_rate.as_hz(),
            "Polling rate differs"
        );
        writes.push(CorrectiveWrite::PollingRate(persisted.polling_rate));
    }

    if persisted.lift_off != live.lift_off {
        debug!(
            persisted = persisted.lift_off.as_mm(),
            live = live.lift_off.as_mm(),
            "Lift-off distance differs"
        );
        writes.push(CorrectiveWrite::LiftOff(persisted.lift_off));
    }

    for (slot, (want, have)) in persisted
        .dpi_profiles
        .iter()
        .zip(live.dpi_profiles.iter())
        .enumerate()
    {
        if want != have {
            debug!(slot, persisted = want.dpi, live = have.dpi, "DPI slot differs");
            writes.push(CorrectiveWrite::DpiProfile {
                slot,
                profile: *want,
            });
        }
    }

    writes
}
