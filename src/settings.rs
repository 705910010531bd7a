//! # Persistent Link Settings
//!
//! Peer address, radio settings and failsafe frame survive restarts through a
//! [`SettingsStore`]. A store that holds nothing usable loads as `None`; the
//! caller then falls back to [`LinkSettings::default`] and stays unpaired.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{LinkError, Result};
use crate::protocol::types::{Address, ControlFrame, PaLevel, RfChannel, DEFAULT_PA_LEVEL, DEFAULT_RF_CHANNEL};

/// Marks a settings file written by this crate
pub const SETTINGS_MAGIC: u32 = 0x524c_0001;

/// Everything a device must remember about its link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSettings {
    pub peer: Address,
    pub rf_channel: RfChannel,
    pub pa_level: PaLevel,
    pub failsafe: ControlFrame,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            peer: Address::NONE,
            rf_channel: DEFAULT_RF_CHANNEL,
            pa_level: DEFAULT_PA_LEVEL,
            failsafe: ControlFrame::neutral(),
        }
    }
}

/// Load/save collaborator for [`LinkSettings`]
pub trait SettingsStore: Send {
    /// Stored settings, or `None` if nothing valid was saved
    fn load(&mut self) -> Result<Option<LinkSettings>>;

    fn save(&mut self, settings: &LinkSettings) -> Result<()>;
}

/// Settings held in memory only
#[derive(Debug, Default, Clone)]
pub struct MemorySettingsStore {
    stored: Option<LinkSettings>,
    saves: usize,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: LinkSettings) -> Self {
        Self {
            stored: Some(settings),
            saves: 0,
        }
    }

    pub fn stored(&self) -> Option<&LinkSettings> {
        self.stored.as_ref()
    }

    /// Number of completed saves
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&mut self) -> Result<Option<LinkSettings>> {
        Ok(self.stored)
    }

    fn save(&mut self, settings: &LinkSettings) -> Result<()> {
        self.stored = Some(*settings);
        self.saves += 1;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct SettingsFile {
    magic: u32,
    #[serde(flatten)]
    settings: LinkSettings,
}

/// Settings kept in a JSON file
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&mut self) -> Result<Option<LinkSettings>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let file: SettingsFile = match serde_json::from_str(&contents) {
            Ok(file) => file,
            Err(e) => {
                warn!("Ignoring unreadable settings file {}: {}", self.path.display(), e);
                return Ok(None);
            }
        };

        if file.magic != SETTINGS_MAGIC {
            warn!(
                "Ignoring settings file {} with magic {:#010x}",
                self.path.display(),
                file.magic
            );
            return Ok(None);
        }

        Ok(Some(file.settings))
    }

    fn save(&mut self, settings: &LinkSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = SettingsFile {
            magic: SETTINGS_MAGIC,
            settings: *settings,
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, json).map_err(|e| {
            LinkError::Settings(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        info!("Settings saved to {}", self.path.display());
        Ok(())
    }
}

/// Load settings, falling back to (and saving) the defaults
pub fn load_or_default<S: SettingsStore + ?Sized>(store: &mut S) -> LinkSettings {
    match store.load() {
        Ok(Some(settings)) => return settings,
        Ok(None) => info!("No stored settings, using defaults"),
        Err(e) => warn!("Failed to load settings, using defaults: {}", e),
    }

    let settings = LinkSettings::default();
    if let Err(e) = store.save(&settings) {
        warn!("Failed to save default settings: {}", e);
    }
    settings
}
