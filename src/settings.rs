//! Settings file: TOML at `~/.ftdi-relay-ctl/settings.toml`.
//!
//! Every key is optional. A missing file yields defaults silently; an
//! unreadable or unparseable file prints a warning and yields defaults, so
//! a broken settings file can never stop a relay command.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;

use crate::relay_state::DEFAULT_CHANNELS;

pub const DEFAULT_DURATION: f64 = 0.5;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Settings {
    pub quiet: bool,
    pub verbose: bool,
    /// Momentary pulse length in seconds when `--duration` is not given.
    pub default_duration: f64,
    /// Board width; how many output-register bits are relay channels.
    pub channel_count: u8,
    /// Serial of the last device a command connected to.
    pub last_device: Option<String>,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            quiet: false,
            verbose: false,
            default_duration: DEFAULT_DURATION,
            channel_count: DEFAULT_CHANNELS,
            last_device: None,
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ftdi-relay-ctl").join("settings.toml"))
}

pub fn load(custom_path: Option<&Path>) -> Settings {
    let path = match custom_path {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Some(path) => path,
            None => return Settings::default(),
        },
    };
    if !path.exists() {
        return Settings::default();
    }
    match read(&path) {
        Ok(settings) => settings,
        // load runs before the logger is configured, so this goes straight
        // to stderr
        Err(e) => {
            eprintln!(
                "Warning: failed to load settings from {}: {:#}. Using defaults.",
                path.display(),
                e
            );
            Settings::default()
        }
    }
}

fn read(path: &Path) -> anyhow::Result<Settings> {
    let text = fs::read_to_string(path).context("read settings file")?;
    let settings = toml::from_str(&text).context("parse settings file")?;
    Ok(settings)
}

pub fn save(settings: &Settings, custom_path: Option<&Path>) -> anyhow::Result<()> {
    let path = match custom_path {
        Some(path) => path.to_path_buf(),
        None => default_path().context("no home directory")?,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("create settings directory")?;
    }
    let text = toml::to_string_pretty(settings).context("serialize settings")?;
    fs::write(&path, text).context("write settings file")?;
    Ok(())
}
