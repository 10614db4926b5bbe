//! HID transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that the real HID device and
//! mock devices share the same interface. All device I/O is bounded: reads
//! carry a timeout, and a silent device surfaces as `IoTimeout`.

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::report;
use tracing::trace;

/// Bounded timeout for status reads, in milliseconds.
pub const READ_TIMEOUT_MS: i32 = 250;

/// Abstraction over raw HID report I/O.
pub trait HidTransport: Send {
    /// Write one output report (report ID included in `data`).
    fn write_report(&self, data: &[u8]) -> Result<()>;

    /// Read one input report into `buf`, waiting at most `timeout_ms`.
    ///
    /// Returns the number of bytes read; a timeout is an error, never a
    /// zero-length success.
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;
}

/// Request the device's live settings and decode the status report.
pub fn request_status(transport: &dyn HidTransport) -> Result<DeviceConfig> {
    let request = report::encode_status_request();
    trace!(report_hex = format_args!("{:02X?}", &request[..8]), "status TX");
    transport.write_report(&request)?;

    let mut buf = [0u8; report::REPORT_LEN];
    let n = transport.read_report(&mut buf, READ_TIMEOUT_MS)?;
    trace!(
        len = n,
        report_hex = format_args!("{:02X?}", &buf[..n.min(16)]),
        "status RX"
    );
    report::decode_device_report(&buf[..n])
}

/// Map a hidapi error message onto the transport error taxonomy.
fn classify_hid_error(context: &str, message: String) -> Error {
    let lower = message.to_lowercase();
    if lower.contains("disconnect") || lower.contains("not found") || lower.contains("no such device")
    {
        Error::DeviceNotFound(format!("{context}: {message}"))
    } else if lower.contains("timeout") || lower.contains("timed out") {
        Error::IoTimeout(format!("{context}: {message}"))
    } else {
        Error::IoFailure(format!("{context}: {message}"))
    }
}

/// Real transport over hidapi.
pub struct HidApiTransport {
    device: hidapi::HidDevice,
}

impl HidApiTransport {
    /// Open the first Beast X vendor configuration interface.
    pub fn open_first() -> Result<Self> {
        let devices = crate::device::discover_devices()?;
        let info = devices
            .first()
            .ok_or_else(|| Error::DeviceNotFound("no Beast X interface present".to_string()))?;

        let api = hidapi::HidApi::new()
            .map_err(|e| Error::IoFailure(format!("hidapi init: {e}")))?;
        let path = std::ffi::CString::new(info.path.as_bytes())
            .map_err(|e| Error::IoFailure(format!("device path: {e}")))?;
        let device = api
            .open_path(&path)
            .map_err(|e| classify_hid_error("open", e.to_string()))?;

        Ok(Self { device })
    }
}

impl HidTransport for HidApiTransport {
    fn write_report(&self, data: &[u8]) -> Result<()> {
        let n = self
            .device
            .write(data)
            .map_err(|e| classify_hid_error("write", e.to_string()))?;
        if n == 0 {
            return Err(Error::IoFailure("write accepted zero bytes".to_string()));
        }
        Ok(())
    }

    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        let n = self
            .device
            .read_timeout(buf, timeout_ms)
            .map_err(|e| classify_hid_error("read", e.to_string()))?;
        if n == 0 {
            return Err(Error::IoTimeout(format!(
                "no report within {timeout_ms}ms"
            )));
        }
        Ok(n)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_disconnect_message() {
        let err = classify_hid_error("write", "device disconnect detected".into());
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }

    #[test]
    fn classify_timeout_message() {
        let err = classify_hid_error("read", "operation timed out".into());
        assert!(matches!(err, Error::IoTimeout(_)));
    }

    #[test]
    fn classify_other_message_as_failure() {
        let err = classify_hid_error("write", "pipe error".into());
        assert!(matches!(err, Error::IoFailure(_)));
    }
}
