// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The desired-state document and its command-line overrides.
//!
//! Every tunable resolves through the same precedence chain: command-line
//! override, then the per-device setting, then the document's `defaults`
//! block, then a built-in default.

mod modifier;
mod validator;

pub use modifier::{AwsNitroNVMeModifier, LvmModifier, Modifier, ModifierError};
pub use validator::{
    DeviceValidator, FileSystemValidator, LvmConsumptionValidator,
    ModeValidator, MountOptionsValidator, MountPointValidator, OwnerValidator,
    ResizeThresholdValidator, ValidationError, Validator,
};

use crate::model::{FilePermissions, FileSystem, Mode, MountOptions};
use camino::Utf8PathBuf;
use clap::Parser;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ebs-bootstrap/config.yml";

const DEFAULT_MODE: Mode = Mode::Healthcheck;
const DEFAULT_MOUNT_OPTIONS: &str = "defaults";
const DEFAULT_RESIZE_THRESHOLD: f64 = 0.0;
const DEFAULT_LVM_CONSUMPTION: u64 = 100;

/// Command-line flags. Every flag other than `--config` overrides the
/// corresponding document setting for all devices.
#[derive(Debug, Parser)]
#[command(
    name = "ebs-bootstrap",
    about = "Bootstraps block storage on a Linux host into a declared state"
)]
pub struct Flags {
    /// Path to the config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: Utf8PathBuf,

    /// Override for mode (healthcheck|prompt|force)
    #[arg(long, value_parser = parse_mode_flag)]
    pub mode: Option<Mode>,

    /// Force a remount when a device is already mounted at its target
    #[arg(long)]
    pub remount: bool,

    /// Override for mount options
    #[arg(long)]
    pub mount_options: Option<String>,

    /// Enable filesystem resizing
    #[arg(long)]
    pub resize_fs: bool,

    /// Override for the resize threshold (percent, 0-100)
    #[arg(long)]
    pub resize_threshold: Option<f64>,

    /// Override for the logical volume percent-of-group target (0-100)
    #[arg(long)]
    pub lvm_consumption: Option<u64>,
}

/// `user`/`group` accept either a name or a bare numeric id; YAML parses
/// the latter as an integer, so both scalar forms are folded to a string.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Number(u64),
        Text(String),
    }
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        None => None,
        Some(Scalar::Number(n)) => Some(n.to_string()),
        Some(Scalar::Text(s)) => Some(s),
    })
}

fn parse_mode_flag(s: &str) -> Result<Mode, String> {
    match Mode::parse(s) {
        Ok(Mode::Empty) | Err(_) => {
            Err(format!("Mode '{s}' is not supported"))
        }
        Ok(mode) => Ok(mode),
    }
}

/// The tunables that may appear under `defaults`, on a device, or as flag
/// overrides. Absent means "defer to the next level of precedence".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Options {
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub remount: Option<bool>,
    #[serde(default)]
    pub mount_options: Option<MountOptions>,
    #[serde(default)]
    pub resize_fs: Option<bool>,
    #[serde(default)]
    pub resize_threshold: Option<f64>,
    #[serde(default)]
    pub lvm_consumption: Option<u64>,
}

/// Desired state of a single device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DeviceSpec {
    #[serde(default)]
    pub fs: Option<FileSystem>,
    #[serde(default)]
    pub mount_point: Option<Utf8PathBuf>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub group: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub permissions: Option<FilePermissions>,
    #[serde(default)]
    pub lvm: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub remount: Option<bool>,
    #[serde(default)]
    pub mount_options: Option<MountOptions>,
    #[serde(default)]
    pub resize_fs: Option<bool>,
    #[serde(default)]
    pub resize_threshold: Option<f64>,
    #[serde(default)]
    pub lvm_consumption: Option<u64>,
}

/// The loaded desired-state document plus flag overrides.
///
/// The document is read once, possibly rewritten by the configured
/// [`Modifier`]s, and read-only from the moment the first layer runs.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub defaults: Options,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceSpec>,
    #[serde(skip)]
    pub(crate) overrides: Options,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{path}: File not found")]
    NotFound { path: Utf8PathBuf },

    #[error("{path}: {source}")]
    Read { path: Utf8PathBuf, source: std::io::Error },

    #[error("{path}: Failed to ingest malformed config: {source}")]
    Malformed { path: Utf8PathBuf, source: serde_yaml::Error },
}

impl Config {
    /// Loads the document named by `--config` and injects the flag
    /// overrides.
    pub fn load(flags: &Flags) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(&flags.config).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound { path: flags.config.clone() }
            } else {
                ConfigError::Read { path: flags.config.clone(), source }
            }
        })?;
        let mut config: Config = serde_yaml::from_str(&contents)
            .map_err(|source| ConfigError::Malformed {
                path: flags.config.clone(),
                source,
            })?;
        config.overrides = Options {
            mode: flags.mode,
            remount: flags.remount.then_some(true),
            mount_options: flags
                .mount_options
                .as_deref()
                .map(MountOptions::from),
            resize_fs: flags.resize_fs.then_some(true),
            resize_threshold: flags.resize_threshold,
            lvm_consumption: flags.lvm_consumption,
        };
        Ok(config)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceSpec> {
        self.devices.get(name)
    }

    /// Resolved safety mode for a device. An explicit empty mode at any
    /// level is treated as unset.
    pub fn mode(&self, name: &str) -> Mode {
        let Some(device) = self.devices.get(name) else {
            return DEFAULT_MODE;
        };
        self.overrides
            .mode
            .filter(|m| *m != Mode::Empty)
            .or(device.mode.filter(|m| *m != Mode::Empty))
            .or(self.defaults.mode.filter(|m| *m != Mode::Empty))
            .unwrap_or(DEFAULT_MODE)
    }

    pub fn remount(&self, name: &str) -> bool {
        let Some(device) = self.devices.get(name) else {
            return false;
        };
        self.overrides.remount.unwrap_or(false)
            || device.remount.unwrap_or(false)
            || self.defaults.remount.unwrap_or(false)
    }

    pub fn mount_options(&self, name: &str) -> MountOptions {
        let not_empty =
            |options: &MountOptions| !options.as_str().is_empty();
        let Some(device) = self.devices.get(name) else {
            return MountOptions::from(DEFAULT_MOUNT_OPTIONS);
        };
        self.overrides
            .mount_options
            .clone()
            .filter(|o| not_empty(o))
            .or(device.mount_options.clone().filter(|o| not_empty(o)))
            .or(self.defaults.mount_options.clone().filter(|o| not_empty(o)))
            .unwrap_or_else(|| MountOptions::from(DEFAULT_MOUNT_OPTIONS))
    }

    pub fn resize_fs(&self, name: &str) -> bool {
        let Some(device) = self.devices.get(name) else {
            return false;
        };
        self.overrides.resize_fs.unwrap_or(false)
            || device.resize_fs.unwrap_or(false)
            || self.defaults.resize_fs.unwrap_or(false)
    }

    /// Resolved resize threshold. Zero requests an unconditional resize
    /// whenever resizing is enabled.
    pub fn resize_threshold(&self, name: &str) -> f64 {
        let Some(device) = self.devices.get(name) else {
            return DEFAULT_RESIZE_THRESHOLD;
        };
        self.overrides
            .resize_threshold
            .or(device.resize_threshold)
            .or(self.defaults.resize_threshold)
            .unwrap_or(DEFAULT_RESIZE_THRESHOLD)
    }

    /// Resolved percent-of-group target for logical volumes. Zero is
    /// treated as unset.
    pub fn lvm_consumption(&self, name: &str) -> u64 {
        let set = |consumption: &u64| *consumption > 0;
        let Some(device) = self.devices.get(name) else {
            return DEFAULT_LVM_CONSUMPTION;
        };
        self.overrides
            .lvm_consumption
            .filter(set)
            .or(device.lvm_consumption.filter(set))
            .or(self.defaults.lvm_consumption.filter(set))
            .unwrap_or(DEFAULT_LVM_CONSUMPTION)
    }

    #[cfg(test)]
    pub(crate) fn parse(contents: &str) -> Result<Config, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    #[cfg(test)]
    pub(crate) fn set_overrides(&mut self, overrides: Options) {
        self.overrides = overrides;
    }
}
