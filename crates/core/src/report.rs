//! Beast X vendor report encoding and decoding.
//!
//! The mouse is configured through 64-byte output reports on its vendor
//! HID interface (report ID 0x04). Settings writes use a 32-byte settings
//! frame padded to 64 bytes with zeros. The polling-rate and lift-off
//! frames below were captured byte-for-byte from the stock software; the
//! frame layout is a versioned contract with the firmware and must only be
//! changed against a real capture.
//!
//! Frame layout (offsets into the 32-byte frame):
//!   - byte 0:      report ID (0x04)
//!   - bytes 1-2:   opcode/check bytes (opaque, taken from captures)
//!   - byte 19:     polling-rate index (0=125Hz .. 5=4000Hz)
//!   - byte 21:     lift-off index (0=1mm, 1=2mm)
//!   - byte 22:     DPI slot select
//!   - bytes 24-27: DPI as little-endian X/Y pair

use crate::config::{DeviceConfig, DpiProfile, DPI_SLOT_COUNT};
use crate::device::{LiftOffDistance, PollingRate};
use crate::error::{Error, Result};
use crate::safety;

/// Total report length, including the report ID.
pub const REPORT_LEN: usize = 64;

/// Report ID of every vendor configuration report.
pub const REPORT_ID: u8 = 0x04;

/// Length of the captured settings frame (padded to `REPORT_LEN`).
const FRAME_LEN: usize = 32;

/// Frame offset of the polling-rate index.
const RATE_BYTE: usize = 19;
/// Frame offset of the lift-off index.
const LOD_BYTE: usize = 21;
/// Frame offset of the DPI slot select byte.
const SLOT_BYTE: usize = 22;
/// Frame offset of the little-endian X/Y DPI pair.
const DPI_BYTES: usize = 24;

/// Opcode of the status-request report (host → device).
const STATUS_REQUEST_OPCODE: u8 = 0xA0;
/// Opcode of the status report (device → host).
const STATUS_OPCODE: u8 = 0xA1;

/// Status report offsets: rate index, lift-off index, active slot, then
/// five little-endian DPI values, then the per-slot XY-independence mask.
const STATUS_RATE: usize = 2;
const STATUS_LOD: usize = 3;
const STATUS_ACTIVE: usize = 4;
const STATUS_DPI: usize = 5;
const STATUS_XY_MASK: usize = 15;

/// Polling-rate set frames, captured from the stock software (USB capture).
/// Index order matches the rate index at byte 19.
#[rustfmt::skip]
const POLL_FRAMES: [[u8; FRAME_LEN]; 6] = [
    // 125 Hz
    [0x04,0x73,0x02,0x06,0x18,0x00,0x00,0x00,0x00,0x04,0x04,0x04,0x00,0x00,0x21,0x00,0x95,0x01,0x00,0x00,0x00,0x00,0x01,0x00,0x40,0x06,0x40,0x06,0x10,0x00,0xc8,0x01],
    // 250 Hz
    [0x04,0x71,0x83,0x06,0x18,0x00,0x00,0x00,0x00,0x04,0x04,0x04,0x00,0x00,0x21,0x00,0x95,0x01,0x00,0x01,0x00,0x00,0x01,0x00,0x40,0x06,0x40,0x06,0x10,0x00,0xc8,0x01],
    // 500 Hz
    [0x04,0x74,0x40,0x06,0x18,0x00,0x00,0x00,0x00,0x04,0x04,0x04,0x00,0x00,0x21,0x00,0x95,0x01,0x00,0x02,0x00,0x00,0x01,0x00,0x40,0x06,0x40,0x06,0x10,0x00,0xc8,0x01],
    // 1000 Hz
    [0x04,0x76,0xc1,0x06,0x18,0x00,0x00,0x00,0x00,0x04,0x04,0x04,0x00,0x00,0x21,0x00,0x95,0x01,0x00,0x03,0x00,0x00,0x01,0x00,0x40,0x06,0x40,0x06,0x10,0x00,0xc8,0x01],
    // 2000 Hz
    [0x04,0x7d,0x86,0x06,0x18,0x00,0x00,0x00,0x00,0x04,0x04,0x04,0x00,0x00,0x21,0x00,0x95,0x01,0x00,0x04,0x00,0x00,0x01,0x00,0x40,0x06,0x40,0x06,0x10,0x00,0xc8,0x01],
    // 4000 Hz
    [0x04,0x7f,0x07,0x06,0x18,0x00,0x00,0x00,0x00,0x04,0x04,0x04,0x00,0x00,0x21,0x00,0x95,0x01,0x00,0x05,0x00,0x00,0x01,0x00,0x40,0x06,0x40,0x06,0x10,0x00,0xc8,0x01],
];

/// Lift-off set frames, captured from the stock software.
#[rustfmt::skip]
const LOD_FRAMES: [[u8; FRAME_LEN]; 2] = [
    // 1 mm
    [0x04,0x76,0xc1,0x06,0x18,0x00,0x00,0x00,0x00,0x04,0x04,0x04,0x00,0x00,0x21,0x00,0x95,0x01,0x00,0x03,0x00,0x00,0x01,0x00,0x40,0x06,0x40,0x06,0x10,0x00,0xc8,0x01],
    // 2 mm
    [0x04,0x72,0x3d,0x06,0x18,0x00,0x00,0x00,0x00,0x04,0x04,0x04,0x00,0x00,0x21,0x00,0x95,0x01,0x00,0x03,0x00,0x01,0x01,0x00,0x40,0x06,0x40,0x06,0x10,0x00,0xc8,0x01],
];

// TODO: confirm the opcode/check bytes of the DPI set frame against a USB
// capture of the stock software; 0x7A is extrapolated from the frame family.
const DPI_OPCODE: [u8; 2] = [0x7A, 0x00];

/// Wire index of a polling rate (byte 19 of the settings frame).
pub fn rate_index(rate: PollingRate) -> u8 {
    match rate {
        PollingRate::Hz125 => 0,
        PollingRate::Hz250 => 1,
        PollingRate::Hz500 => 2,
        PollingRate::Hz1000 => 3,
        PollingRate::Hz2000 => 4,
        PollingRate::Hz4000 => 5,
    }
}

/// Polling rate for a wire index.
pub fn rate_from_index(index: u8) -> Option<PollingRate> {
    match index {
        0 => Some(PollingRate::Hz125),
        1 => Some(PollingRate::Hz250),
        2 => Some(PollingRate::Hz500),
        3 => Some(PollingRate::Hz1000),
        4 => Some(PollingRate::Hz2000),
        5 => Some(PollingRate::Hz4000),
        _ => None,
    }
}

/// Wire index of a lift-off distance (byte 21 of the settings frame).
pub fn lod_index(distance: LiftOffDistance) -> u8 {
    match distance {
        LiftOffDistance::Mm1 => 0,
        LiftOffDistance::Mm2 => 1,
    }
}

/// Lift-off distance for a wire index.
pub fn lod_from_index(index: u8) -> Option<LiftOffDistance> {
    match index {
        0 => Some(LiftOffDistance::Mm1),
        1 => Some(LiftOffDistance::Mm2),
        _ => None,
    }
}

fn pad(frame: &[u8; FRAME_LEN]) -> [u8; REPORT_LEN] {
    let mut buf = [0u8; REPORT_LEN];
    buf[..FRAME_LEN].copy_from_slice(frame);
    buf
}

/// Encode the polling-rate set report.
pub fn encode_polling_rate(rate: PollingRate) -> [u8; REPORT_LEN] {
    pad(&POLL_FRAMES[rate_index(rate) as usize])
}

/// Encode the lift-off set report.
pub fn encode_lift_off(distance: LiftOffDistance) -> [u8; REPORT_LEN] {
    pad(&LOD_FRAMES[lod_index(distance) as usize])
}

/// Encode the DPI set report for one profile slot.
///
/// Rejects the slot or value before building the packet; an invalid value
/// never produces a partial write.
pub fn encode_dpi_profile(slot: usize, profile: &DpiProfile) -> Result<[u8; REPORT_LEN]> {
    safety::validate_slot(slot)?;
    let dpi = safety::validate_dpi(profile.dpi)?;

    // Same settings frame as the captured writes, with the DPI payload.
    let mut frame = POLL_FRAMES[rate_index(PollingRate::Hz1000) as usize];
    frame[1] = DPI_OPCODE[0];
    frame[2] = DPI_OPCODE[1];
    frame[SLOT_BYTE] = slot as u8;
    // Both axes carry the same value until per-axis DPI is wired up.
    frame[DPI_BYTES..DPI_BYTES + 2].copy_from_slice(&dpi.to_le_bytes());
    frame[DPI_BYTES + 2..DPI_BYTES + 4].copy_from_slice(&dpi.to_le_bytes());
    Ok(pad(&frame))
}

/// Encode the status-request report that asks the device for its live
/// settings.
pub fn encode_status_request() -> [u8; REPORT_LEN] {
    let mut buf = [0u8; REPORT_LEN];
    buf[0] = REPORT_ID;
    buf[1] = STATUS_REQUEST_OPCODE;
    buf
}

/// Decode a live-state status report into a configuration snapshot.
///
/// A report that does not match the expected signature is an error, never
/// a default: a malformed report means protocol drift or a wrong device.
pub fn decode_device_report(data: &[u8]) -> Result<DeviceConfig> {
    if data.len() != REPORT_LEN {
        return Err(Error::MalformedReport(format!(
            "length {} (expected {REPORT_LEN})",
            data.len()
        )));
    }
    if data[0] != REPORT_ID || data[1] != STATUS_OPCODE {
        return Err(Error::MalformedReport(format!(
            "header {:02X} {:02X} (expected {REPORT_ID:02X} {STATUS_OPCODE:02X})",
            data[0], data[1]
        )));
    }

    let polling_rate = rate_from_index(data[STATUS_RATE]).ok_or_else(|| {
        Error::MalformedReport(format!("rate index {}", data[STATUS_RATE]))
    })?;
    let lift_off = lod_from_index(data[STATUS_LOD]).ok_or_else(|| {
        Error::MalformedReport(format!("lift-off index {}", data[STATUS_LOD]))
    })?;

    let active_profile = data[STATUS_ACTIVE];
    if active_profile as usize >= DPI_SLOT_COUNT {
        return Err(Error::MalformedReport(format!(
            "active slot {active_profile}"
        )));
    }

    let xy_mask = data[STATUS_XY_MASK];
    let mut dpi_profiles = [DpiProfile::default(); DPI_SLOT_COUNT];
    for (slot, profile) in dpi_profiles.iter_mut().enumerate() {
        let off = STATUS_DPI + slot * 2;
        let dpi = u16::from_le_bytes([data[off], data[off + 1]]);
        if !(safety::DPI_MIN..=safety::DPI_MAX).contains(&dpi) {
            return Err(Error::MalformedReport(format!("slot {slot} dpi {dpi}")));
        }
        *profile = DpiProfile {
            dpi,
            xy_independent: xy_mask & (1 << slot) != 0,
        };
    }

    Ok(DeviceConfig {
        polling_rate,
        lift_off,
        dpi_profiles,
        active_profile,
    })
}

/// Build the status report a device would send for `config`. Test helper
/// for the mock transport.
#[cfg(test)]
pub(crate) fn encode_status_report(config: &DeviceConfig) -> [u8; REPORT_LEN] {
    let mut buf = [0u8; REPORT_LEN];
    buf[0] = REPORT_ID;
    buf[1] = STATUS_OPCODE;
    buf[STATUS_RATE] = rate_index(config.polling_rate);
    buf[STATUS_LOD] = lod_index(config.lift_off);
    buf[STATUS_ACTIVE] = config.active_profile;
    for (slot, profile) in config.dpi_profiles.iter().enumerate() {
        let off = STATUS_DPI + slot * 2;
        buf[off..off + 2].copy_from_slice(&profile.dpi.to_le_bytes());
        if profile.xy_independent {
            buf[STATUS_XY_MASK] |= 1 << slot;
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_index_roundtrip() {
        for rate in PollingRate::ALL {
            assert_eq!(rate_from_index(rate_index(*rate)), Some(*rate));
        }
        assert_eq!(rate_from_index(6), None);
    }

    #[test]
    fn lod_index_roundtrip() {
        for lod in LiftOffDistance::ALL {
            assert_eq!(lod_from_index(lod_index(*lod)), Some(*lod));
        }
        assert_eq!(lod_from_index(2), None);
    }

    #[test]
    fn poll_frames_carry_rate_index() {
        for rate in PollingRate::ALL {
            let report = encode_polling_rate(*rate);
            assert_eq!(report.len(), REPORT_LEN);
            assert_eq!(report[0], REPORT_ID);
            assert_eq!(report[RATE_BYTE], rate_index(*rate));
            // padding is zeroed
            assert!(report[FRAME_LEN..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn lod_frames_carry_lod_index() {
        for lod in LiftOffDistance::ALL {
            let report = encode_lift_off(*lod);
            assert_eq!(report[0], REPORT_ID);
            assert_eq!(report[LOD_BYTE], lod_index(*lod));
        }
    }

    #[test]
    fn encode_is_deterministic() {
        assert_eq!(
            encode_polling_rate(PollingRate::Hz2000),
            encode_polling_rate(PollingRate::Hz2000)
        );
        assert_eq!(
            encode_dpi_profile(1, &DpiProfile::new(1600)).unwrap(),
            encode_dpi_profile(1, &DpiProfile::new(1600)).unwrap()
        );
    }

    #[test]
    fn dpi_report_layout() {
        let report = encode_dpi_profile(3, &DpiProfile::new(1600)).unwrap();
        assert_eq!(report[0], REPORT_ID);
        assert_eq!(report[SLOT_BYTE], 3);
        // 1600 = 0x0640 little-endian, on both axes
        assert_eq!(&report[DPI_BYTES..DPI_BYTES + 4], &[0x40, 0x06, 0x40, 0x06]);
    }

    #[test]
    fn dpi_encoding_rounds_to_step() {
        let report = encode_dpi_profile(0, &DpiProfile::new(815)).unwrap();
        // 815 rounds to 800 = 0x0320
        assert_eq!(&report[DPI_BYTES..DPI_BYTES + 2], &[0x20, 0x03]);
    }

    #[test]
    fn dpi_rejects_out_of_range_before_encoding() {
        assert!(encode_dpi_profile(0, &DpiProfile::new(49)).is_err());
        assert!(encode_dpi_profile(0, &DpiProfile::new(26050)).is_err());
        assert!(encode_dpi_profile(5, &DpiProfile::new(800)).is_err());
    }

    #[test]
    fn status_report_roundtrip() {
        let mut config = DeviceConfig::default();
        config.polling_rate = PollingRate::Hz4000;
        config.lift_off = LiftOffDistance::Mm2;
        config.active_profile = 2;
        config.dpi_profiles[2] = DpiProfile {
            dpi: 12800,
            xy_independent: true,
        };

        let report = encode_status_report(&config);
        let decoded = decode_device_report(&report).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let report = encode_status_report(&DeviceConfig::default());
        assert!(decode_device_report(&report[..32]).is_err());
        assert!(decode_device_report(&[]).is_err());
    }

    #[test]
    fn decode_rejects_wrong_header() {
        let mut report = encode_status_report(&DeviceConfig::default());
        report[0] = 0x05;
        assert!(decode_device_report(&report).is_err());

        let mut report = encode_status_report(&DeviceConfig::default());
        report[1] = 0x00;
        assert!(decode_device_report(&report).is_err());
    }

    #[test]
    fn decode_rejects_out_of_domain_fields() {
        let mut report = encode_status_report(&DeviceConfig::default());
        report[STATUS_RATE] = 6;
        assert!(decode_device_report(&report).is_err());

        let mut report = encode_status_report(&DeviceConfig::default());
        report[STATUS_LOD] = 2;
        assert!(decode_device_report(&report).is_err());

        let mut report = encode_status_report(&DeviceConfig::default());
        report[STATUS_ACTIVE] = 5;
        assert!(decode_device_report(&report).is_err());

        let mut report = encode_status_report(&DeviceConfig::default());
        report[STATUS_DPI] = 0x00;
        report[STATUS_DPI + 1] = 0x00;
        assert!(decode_device_report(&report).is_err());
    }

    #[test]
    fn echoed_set_report_is_not_a_status_report() {
        // A device echo of a settings write must not decode as live state.
        let echoed = encode_polling_rate(PollingRate::Hz1000);
        assert!(decode_device_report(&echoed).is_err());
    }
}
