//! Integration tests: exercise the full flow against a simulated Beast X.
//!
//! These tests drive the session command interface end to end, from
//! connect through reconcile to failure, with a mock transport standing in
//! for the physical mouse and a temp-dir store standing in for the user's
//! config file.

#[cfg(test)]
mod tests {
    use crate::config::{DeviceConfig, DpiProfile, Store};
    use crate::device::{LiftOffDistance, PollingRate};
    use crate::error::Error;
    use crate::report;
    use crate::session::{ConnectionState, Notification, Session};
    use crate::transport::mock::{MockTransport, ScriptedOpener};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn build_session(dir: &tempfile::TempDir) -> (Session, Arc<MockTransport>) {
        let mock = MockTransport::new();
        let opener = ScriptedOpener::new(Arc::clone(&mock));
        let store = Store::new(dir.path().join("config.json"));
        let session = Session::new(Box::new(opener), store);
        session.set_retry_interval(Duration::ZERO);
        (session, mock)
    }

    /// Reconciliation re-sends exactly the persisted polling rate when the
    /// device has drifted back to a firmware default.
    #[test]
    fn reconnect_restores_persisted_polling_rate() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("config.json"));
        let mut persisted = DeviceConfig::default();
        persisted.polling_rate = PollingRate::Hz2000;
        store.save(&persisted).unwrap();

        let (session, mock) = build_session(&dir);
        let mut live = persisted.clone();
        live.polling_rate = PollingRate::Hz1000;
        mock.queue_status(&live);

        session.connect().unwrap();

        let writes = mock.written_settings();
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0],
            report::encode_polling_rate(PollingRate::Hz2000).to_vec()
        );
    }

    /// A matching device produces no corrective writes at all.
    #[test]
    fn reconnect_with_matching_device_is_quiet() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);
        mock.queue_status(&session.snapshot());

        session.connect().unwrap();
        assert!(mock.written_settings().is_empty());
    }

    /// Every committed edit is written through to disk immediately.
    #[test]
    fn edits_are_written_through_to_disk() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);
        mock.queue_status(&session.snapshot());
        session.connect().unwrap();

        session.set_polling_rate(PollingRate::Hz4000).unwrap();
        session.set_lift_off(LiftOffDistance::Mm2).unwrap();
        session.set_dpi_profile(2, 815).unwrap(); // rounds to 800

        let on_disk = Store::new(dir.path().join("config.json")).load();
        assert_eq!(on_disk.polling_rate, PollingRate::Hz4000);
        assert_eq!(on_disk.lift_off, LiftOffDistance::Mm2);
        assert_eq!(on_disk.dpi_profiles[2], DpiProfile::new(800));

        // three settings packets reached the device
        assert_eq!(mock.written_settings().len(), 3);
    }

    /// An edit made while disconnected must not be clobbered by connect:
    /// the in-memory config is reconciled, never reloaded from disk.
    #[test]
    fn offline_edit_survives_reconnect() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);

        session.set_active_profile(3).unwrap();

        let mut live = session.snapshot();
        live.active_profile = 0; // device knows nothing of the edit
        mock.queue_status(&live);
        session.connect().unwrap();

        assert_eq!(session.snapshot().active_profile, 3);
    }

    /// A malformed live read skips reconciliation for the cycle but keeps
    /// the connection; the condition is surfaced, never defaulted away.
    #[test]
    fn malformed_live_state_skips_reconciliation() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);
        let rx = session.subscribe();
        mock.queue_malformed();

        session.connect().unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);
        assert!(mock.written_settings().is_empty());

        let warned = rx
            .try_iter()
            .any(|n| matches!(n, Notification::Warning(_)));
        assert!(warned);
    }

    /// A transport-level failure during the live read follows the normal
    /// failure path down to Disconnected.
    #[test]
    fn read_failure_during_reconcile_disconnects() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);
        mock.queue_read_failure("unplugged");

        let err = session.connect().unwrap_err();
        assert!(matches!(err, Error::IoFailure(_)));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    /// A silent device is a bounded timeout, not a hang.
    #[test]
    fn silent_device_times_out_and_disconnects() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);
        // no reads queued: the status read times out

        let err = session.connect().unwrap_err();
        assert!(matches!(err, Error::IoTimeout(_)));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        drop(mock);
    }

    /// Unplugging mid-command resolves the pending call with an I/O error
    /// and the next tick brings the session back.
    #[test]
    fn unplug_mid_command_then_reconnect() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);
        mock.queue_status(&session.snapshot());
        session.connect().unwrap();

        mock.fail_writes(true);
        let err = session.set_dpi_profile(1, 1600).unwrap_err();
        assert!(matches!(err, Error::IoFailure(_)));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        // the failed edit was not committed
        assert_eq!(session.snapshot().dpi_profiles[1].dpi, 800);

        mock.fail_writes(false);
        mock.queue_status(&session.snapshot());
        assert!(session.maybe_reconnect());
        assert_eq!(session.state(), ConnectionState::Connected);

        session.set_dpi_profile(1, 1600).unwrap();
        assert_eq!(session.snapshot().dpi_profiles[1].dpi, 1600);
    }

    /// Out-of-domain values are rejected before any I/O is attempted.
    #[test]
    fn invalid_values_never_reach_the_device() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);
        mock.queue_status(&session.snapshot());
        session.connect().unwrap();
        let baseline = mock.written().len();

        assert!(matches!(
            session.set_dpi_profile(0, 30000),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            session.set_dpi_profile(9, 800),
            Err(Error::OutOfRange { .. })
        ));
        assert_eq!(mock.written().len(), baseline);
    }

    /// Snapshots delivered to subscribers reflect each committed edit in
    /// order.
    #[test]
    fn subscribers_see_committed_snapshots_in_order() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);
        mock.queue_status(&session.snapshot());
        session.connect().unwrap();

        let rx = session.subscribe();
        session.set_polling_rate(PollingRate::Hz250).unwrap();
        session.set_polling_rate(PollingRate::Hz500).unwrap();

        let rates: Vec<u16> = rx
            .try_iter()
            .filter_map(|n| match n {
                Notification::Snapshot(c) => Some(c.polling_rate.as_hz()),
                _ => None,
            })
            .collect();
        assert_eq!(rates, vec![250, 500]);
    }

    /// Reconnect ticks are skipped outright while a command holds the
    /// session.
    #[test]
    fn reconnect_tick_defers_to_inflight_command() {
        let dir = tempdir().unwrap();
        let (session, mock) = build_session(&dir);
        mock.queue_status(&session.snapshot());
        let session = Arc::new(session);
        session.connect().unwrap();

        let gate = mock.gate_writes();
        let worker = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.set_lift_off(LiftOffDistance::Mm2))
        };

        while !matches!(session.set_active_profile(0), Err(Error::Busy)) {
            std::thread::yield_now();
        }
        assert!(!session.maybe_reconnect());

        drop(gate);
        worker.join().unwrap().unwrap();
    }
}
