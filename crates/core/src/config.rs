//! Persisted device configuration.
//!
//! `DeviceConfig` is the unit persisted to disk and the unit reconciled
//! against live device state after a reconnect. Storage is a JSON file at
//! `~/.config/beastx/config.json` (platform equivalent via `dirs`).

use crate::device::{LiftOffDistance, PollingRate};
use crate::error::{Error, Result};
use crate::safety;
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config directory name under the platform config root.
const CONFIG_DIR: &str = "beastx";

/// Config file name.
const CONFIG_FILE: &str = "config.json";

/// Fixed number of DPI profile slots on the Beast X.
pub const DPI_SLOT_COUNT: usize = 5;

/// A single DPI profile slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DpiProfile {
    /// DPI value, 50–26,000 in steps of 50.
    pub dpi: u16,
    /// Per-axis DPI independence (PAW3395 capability; both axes currently
    /// carry the same value on the wire).
    pub xy_independent: bool,
}

impl DpiProfile {
    pub fn new(dpi: u16) -> Self {
        Self {
            dpi,
            xy_independent: false,
        }
    }
}

impl Default for DpiProfile {
    fn default() -> Self {
        Self::new(800)
    }
}

// Older config files stored DPI profiles as a bare integer list.
impl<'de> Deserialize<'de> for DpiProfile {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bare(u16),
            Full {
                dpi: u16,
                #[serde(default)]
                xy_independent: bool,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Bare(dpi) => DpiProfile::new(dpi),
            Repr::Full {
                dpi,
                xy_independent,
            } => DpiProfile {
                dpi,
                xy_independent,
            },
        })
    }
}

/// The full persisted mouse configuration.
///
/// Unknown JSON fields are ignored on load; missing fields take the
/// documented defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Active polling rate.
    #[serde(default = "default_polling_rate")]
    pub polling_rate: PollingRate,

    /// Active lift-off distance.
    #[serde(default = "default_lift_off")]
    pub lift_off: LiftOffDistance,

    /// DPI profile slots. Exactly five always exist; shorter lists from
    /// older files are padded with their last value.
    #[serde(
        default = "default_profiles",
        deserialize_with = "deserialize_profiles"
    )]
    pub dpi_profiles: [DpiProfile; DPI_SLOT_COUNT],

    /// Index of the currently active DPI slot (0-based).
    #[serde(default)]
    pub active_profile: u8,
}

fn default_polling_rate() -> PollingRate {
    PollingRate::Hz1000
}

fn default_lift_off() -> LiftOffDistance {
    LiftOffDistance::Mm1
}

fn default_profiles() -> [DpiProfile; DPI_SLOT_COUNT] {
    [
        DpiProfile::new(400),
        DpiProfile::new(800),
        DpiProfile::new(1600),
        DpiProfile::new(3200),
        DpiProfile::new(3200),
    ]
}

fn deserialize_profiles<'de, D>(
    deserializer: D,
) -> std::result::Result<[DpiProfile; DPI_SLOT_COUNT], D::Error>
where
    D: Deserializer<'de>,
{
    let listed: Vec<DpiProfile> = Vec::deserialize(deserializer)?;
    let mut slots = default_profiles();
    let mut last = None;
    for (slot, profile) in slots.iter_mut().zip(listed.iter()) {
        *slot = *profile;
        last = Some(*profile);
    }
    // Pad short lists with their last value
    if let Some(last) = last {
        for slot in slots.iter_mut().skip(listed.len()) {
            *slot = last;
        }
    }
    Ok(slots)
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            polling_rate: default_polling_rate(),
            lift_off: default_lift_off(),
            dpi_profiles: default_profiles(),
            active_profile: 0,
        }
    }
}

impl DeviceConfig {
    /// Clamp all loaded values into their domains.
    pub fn validate(&mut self) {
        for profile in self.dpi_profiles.iter_mut() {
            profile.dpi = safety::validate_dpi(profile.dpi)
                .unwrap_or_else(|_| profile.dpi.clamp(safety::DPI_MIN, safety::DPI_MAX));
        }
        if self.active_profile as usize >= DPI_SLOT_COUNT {
            self.active_profile = (DPI_SLOT_COUNT - 1) as u8;
        }
    }

    /// DPI value of the currently active slot.
    pub fn active_dpi(&self) -> u16 {
        self.dpi_profiles[self.active_profile as usize].dpi
    }
}

/// Durable storage for one `DeviceConfig` at a well-known location.
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Store at an explicit path (used by tests and `--config` overrides).
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the per-user default location.
    pub fn at_default_path() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::PersistenceRead("no config directory on this platform".into()))?;
        Ok(Self::new(dir.join(CONFIG_DIR).join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, falling back to defaults.
    ///
    /// A missing file is normal (first run). A corrupt or unreadable file
    /// is logged and replaced by defaults; it must never prevent startup.
    pub fn load(&self) -> DeviceConfig {
        if !self.path.exists() {
            info!(path = %self.path.display(), "Config file not found, using defaults");
            return DeviceConfig::default();
        }

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Config unreadable, using defaults");
                return DeviceConfig::default();
            }
        };

        match serde_json::from_str::<DeviceConfig>(&contents) {
            Ok(mut config) => {
                config.validate();
                info!(
                    path = %self.path.display(),
                    polling_rate = config.polling_rate.as_hz(),
                    lift_off = config.lift_off.as_mm(),
                    active_profile = config.active_profile,
                    "Configuration loaded"
                );
                config
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Config corrupt, using defaults");
                DeviceConfig::default()
            }
        }
    }

    /// Atomically persist the configuration.
    ///
    /// The file is written to a temporary sibling and renamed over the
    /// target, so a crash mid-write leaves the previous file intact.
    pub fn save(&self, config: &DeviceConfig) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::PersistenceWrite("config path has no parent".into()))?;
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::PersistenceWrite(format!("create {}: {e}", parent.display())))?;

        let contents = serde_json::to_string_pretty(config)
            .map_err(|e| Error::PersistenceWrite(format!("serialize: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| Error::PersistenceWrite(format!("temp file: {e}")))?;
        tmp.write_all(contents.as_bytes())
            .map_err(|e| Error::PersistenceWrite(format!("write: {e}")))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::PersistenceWrite(format!("rename: {e}")))?;

        info!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}
