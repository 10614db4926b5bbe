//! Device session: the single owner of the open HID handle.
//!
//! The session sequences all protocol interactions, tracks connection
//! state, and exposes the command interface consumed by the presentation
//! shell. Commands are serialized through an exclusive lock: an
//! overlapping call is rejected with `Busy` instead of queued, so a USB
//! stall cannot grow an unbounded backlog.
//!
//! State machine:
//!   - Disconnected → Connecting → Connected (open succeeds)
//!   - Connecting → Disconnected (open fails; reconnect scheduled)
//!   - Connected → Error(reason) → Disconnected (I/O failure; reconnect
//!     scheduled)
//!   - Connected → Disconnected (explicit close; no reconnect)

use crate::config::{DeviceConfig, DpiProfile, Store};
use crate::device::{LiftOffDistance, PollingRate};
use crate::error::{Error, Result};
use crate::reconcile;
use crate::report;
use crate::safety;
use crate::transport::{self, HidTransport};
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default interval between reconnect attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Connection state of the session. Owned exclusively by the session;
/// the shell observes it through notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Event delivered to shell subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The connection state changed.
    State(ConnectionState),
    /// A read-only snapshot after reconciliation or a committed edit.
    Snapshot(DeviceConfig),
    /// A non-fatal condition the user should see (failed save, skipped
    /// reconciliation).
    Warning(String),
}

/// Produces transports on demand so connect and reconnect share one path.
pub trait TransportOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn HidTransport>>;
}

/// Opener backed by hidapi device enumeration.
pub struct HidApiOpener;

impl TransportOpener for HidApiOpener {
    fn open(&self) -> Result<Box<dyn HidTransport>> {
        transport::HidApiTransport::open_first().map(|t| Box::new(t) as Box<dyn HidTransport>)
    }
}

struct Inner {
    state: ConnectionState,
    transport: Option<Box<dyn HidTransport>>,
    config: DeviceConfig,
    store: Store,
    retry_interval: Duration,
    retry_scheduled: bool,
    last_attempt: Option<Instant>,
}

impl Inner {
    fn require_connected(&self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn write(&mut self, packet: &[u8]) -> Result<()> {
        self.transport
            .as_ref()
            .ok_or(Error::NotConnected)?
            .write_report(packet)
    }

    fn read_live_state(&mut self) -> Result<DeviceConfig> {
        let t = self.transport.as_ref().ok_or(Error::NotConnected)?;
        transport::request_status(t.as_ref())
    }
}

/// The device session. Cheap to share behind an `Arc`; all mutation goes
/// through the internal lock.
pub struct Session {
    opener: Box<dyn TransportOpener>,
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<Sender<Notification>>>,
}

impl Session {
    /// Create a session, loading the persisted configuration once.
    pub fn new(opener: Box<dyn TransportOpener>, store: Store) -> Self {
        let config = store.load();
        Self {
            opener,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                transport: None,
                config,
                store,
                retry_interval: DEFAULT_RETRY_INTERVAL,
                retry_scheduled: false,
                last_attempt: None,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Override the reconnect retry interval.
    pub fn set_retry_interval(&self, interval: Duration) {
        self.lock_inner().retry_interval = interval;
    }

    /// Subscribe to connection and configuration notifications.
    pub fn subscribe(&self) -> Receiver<Notification> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Read-only snapshot of the current configuration.
    pub fn snapshot(&self) -> DeviceConfig {
        self.lock_inner().config.clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.lock_inner().state.clone()
    }

    /// Open the device and reconcile persisted intent with live state.
    pub fn connect(&self) -> Result<()> {
        let mut inner = self.begin_command()?;
        if inner.state == ConnectionState::Connected {
            return Ok(());
        }
        self.connect_locked(&mut inner)
    }

    /// Close the device. Ends the reconnect cycle until the next
    /// `connect`.
    pub fn disconnect(&self) -> Result<()> {
        let mut inner = self.begin_command()?;
        inner.transport = None;
        inner.retry_scheduled = false;
        self.set_state(&mut inner, ConnectionState::Disconnected);
        info!("Session closed");
        Ok(())
    }

    /// Set the polling rate on the device and persist it.
    pub fn set_polling_rate(&self, rate: PollingRate) -> Result<()> {
        let mut inner = self.begin_command()?;
        inner.require_connected()?;

        let packet = report::encode_polling_rate(rate);
        if let Err(e) = inner.write(&packet) {
            return Err(self.fail_locked(&mut inner, e));
        }

        inner.config.polling_rate = rate;
        info!(hz = rate.as_hz(), "Polling rate applied");
        self.commit(&mut inner);
        Ok(())
    }

    /// Set the lift-off distance on the device and persist it.
    pub fn set_lift_off(&self, distance: LiftOffDistance) -> Result<()> {
        let mut inner = self.begin_command()?;
        inner.require_connected()?;

        let packet = report::encode_lift_off(distance);
        if let Err(e) = inner.write(&packet) {
            return Err(self.fail_locked(&mut inner, e));
        }

        inner.config.lift_off = distance;
        info!(mm = distance.as_mm(), "Lift-off distance applied");
        self.commit(&mut inner);
        Ok(())
    }

    /// Set one DPI profile slot on the device and persist it.
    ///
    /// The value is validated and rounded to the sensor step before any
    /// I/O; out-of-range values are rejected with no partial write.
    pub fn set_dpi_profile(&self, slot: usize, dpi: u16) -> Result<()> {
        let mut inner = self.begin_command()?;
        inner.require_connected()?;

        safety::validate_slot(slot)?;
        let dpi = safety::validate_dpi(dpi)?;
        let profile = DpiProfile {
            dpi,
            xy_independent: inner.config.dpi_profiles[slot].xy_independent,
        };
        let packet = report::encode_dpi_profile(slot, &profile)?;
        if let Err(e) = inner.write(&packet) {
            return Err(self.fail_locked(&mut inner, e));
        }

        inner.config.dpi_profiles[slot] = profile;
        info!(slot, dpi, "DPI profile applied");
        self.commit(&mut inner);
        Ok(())
    }

    /// Select the active DPI slot. Local-only: the selection is persisted
    /// and reported in snapshots but involves no device write, so it also
    /// works while disconnected.
    pub fn set_active_profile(&self, slot: usize) -> Result<()> {
        let mut inner = self.begin_command()?;
        safety::validate_slot(slot)?;

        inner.config.active_profile = slot as u8;
        info!(slot, dpi = inner.config.active_dpi(), "Active profile selected");
        self.commit(&mut inner);
        Ok(())
    }

    /// Reconnect tick, driven by the shell's loop or timer.
    ///
    /// Skipped entirely when a command is in flight, when no reconnect is
    /// scheduled, or while the retry interval has not yet elapsed. Returns
    /// whether an attempt was made.
    pub fn maybe_reconnect(&self) -> bool {
        let mut inner = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return false,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
        };

        if inner.state != ConnectionState::Disconnected || !inner.retry_scheduled {
            return false;
        }
        if let Some(last) = inner.last_attempt {
            if last.elapsed() < inner.retry_interval {
                return false;
            }
        }

        debug!("Reconnect attempt");
        let _ = self.connect_locked(&mut inner);
        true
    }

    // Exclusive command entry: an overlapping command observes `Busy`.
    fn begin_command(&self) -> Result<MutexGuard<'_, Inner>> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(Error::Busy),
            Err(TryLockError::Poisoned(e)) => Ok(e.into_inner()),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect_locked(&self, inner: &mut Inner) -> Result<()> {
        inner.last_attempt = Some(Instant::now());
        self.set_state(inner, ConnectionState::Connecting);

        match self.opener.open() {
            Ok(transport) => {
                inner.transport = Some(transport);
                inner.retry_scheduled = false;
                self.set_state(inner, ConnectionState::Connected);
                info!("Device connected");
                self.reconcile_locked(inner)
            }
            Err(e) => {
                warn!(error = %e, "Connect failed");
                self.set_state(inner, ConnectionState::Error(e.to_string()));
                self.set_state(inner, ConnectionState::Disconnected);
                inner.retry_scheduled = true;
                Err(e)
            }
        }
    }

    // Runs once per transition into Connected, before further commands.
    fn reconcile_locked(&self, inner: &mut Inner) -> Result<()> {
        let live = match inner.read_live_state() {
            Ok(live) => live,
            Err(e) if e.is_disconnect() => return Err(self.fail_locked(inner, e)),
            Err(e) => {
                // Malformed live state: keep the connection, skip this
                // cycle, retry on the next connect.
                warn!(error = %e, "Live state unreadable, reconciliation skipped");
                self.publish(Notification::Warning(format!(
                    "reconciliation skipped: {e}"
                )));
                self.publish(Notification::Snapshot(inner.config.clone()));
                return Ok(());
            }
        };

        let plan = reconcile::plan(&inner.config, &live);
        let count = plan.len();
        for write in plan {
            let packet = match write.encode() {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(error = %e, ?write, "Skipping unencodable corrective write");
                    continue;
                }
            };
            if let Err(e) = inner.write(&packet) {
                return Err(self.fail_locked(inner, e));
            }
        }

        info!(writes = count, "Reconciliation complete");
        self.publish(Notification::Snapshot(inner.config.clone()));
        Ok(())
    }

    // I/O failure mid-operation: Error(reason), then auto-downgrade to
    // Disconnected with a reconnect scheduled.
    fn fail_locked(&self, inner: &mut Inner, error: Error) -> Error {
        warn!(error = %error, "Device I/O failed, dropping connection");
        inner.transport = None;
        self.set_state(inner, ConnectionState::Error(error.to_string()));
        self.set_state(inner, ConnectionState::Disconnected);
        inner.retry_scheduled = true;
        error
    }

    // Write-through persistence; a failed save degrades to a warning and
    // the in-memory state stays authoritative for the running session.
    fn commit(&self, inner: &mut Inner) {
        if let Err(e) = inner.store.save(&inner.config) {
            warn!(error = %e, "Write-through save failed");
            self.publish(Notification::Warning(format!("settings not saved: {e}")));
        }
        self.publish(Notification::Snapshot(inner.config.clone()));
    }

    fn publish(&self, notification: Notification) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(notification.clone()).is_ok());
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        if inner.state != state {
            debug!(from = %inner.state, to = %state, "State transition");
            inner.state = state.clone();
            self.publish(Notification::State(state));
        }
    }
}
