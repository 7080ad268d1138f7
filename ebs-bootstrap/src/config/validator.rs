// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validators reject an invalid document before any layer runs. They are
//! applied in a fixed order and the first failure halts the run.

use crate::config::Config;
use crate::model::{FileSystem, Mode, MountOptions};
use crate::service::{DeviceService, OwnerService, ServiceError};
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("{device}: Must provide a supported file system")]
    MissingFileSystem { device: String },

    #[error("'{scope}' must not carry an empty mode")]
    EmptyModeGlobal { scope: &'static str },

    #[error("{device}: must not carry an empty mode")]
    EmptyModeDevice { device: String },

    #[error(
        "'{value}' ({scope}) must be a floating point between 0 and 100 \
         (inclusive)"
    )]
    ResizeThresholdGlobal { scope: &'static str, value: f64 },

    #[error(
        "{device}: '{value}' must be a floating point between 0 and 100 \
         (inclusive)"
    )]
    ResizeThresholdDevice { device: String, value: f64 },

    #[error(
        "'{value}' ({scope}) must be an integer between 0 and 100 (inclusive)"
    )]
    LvmConsumptionGlobal { scope: &'static str, value: u64 },

    #[error(
        "{device}: '{value}' must be an integer between 0 and 100 (inclusive)"
    )]
    LvmConsumptionDevice { device: String, value: u64 },

    #[error("{device}: {path} is not an absolute path")]
    MountPointNotAbsolute { device: String, path: String },

    #[error("{device}: Can not be mounted to the root directory")]
    MountPointIsRoot { device: String },

    #[error("'{options}' ({scope}) is not supported as {reason}")]
    MountOptionsGlobal {
        scope: &'static str,
        options: String,
        reason: &'static str,
    },

    #[error("{device}: '{options}' is not supported as {reason}")]
    MountOptionsDevice {
        device: String,
        options: String,
        reason: &'static str,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub trait Validator {
    fn validate(&self, config: &Config) -> Result<(), ValidationError>;
}

/// Every managed device must name a filesystem this tool can create and
/// probe.
pub struct FileSystemValidator {}

impl FileSystemValidator {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for FileSystemValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for FileSystemValidator {
    fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        for (name, spec) in &config.devices {
            match spec.fs {
                Some(FileSystem::Ext4) | Some(FileSystem::Xfs) => {}
                _ => {
                    return Err(ValidationError::MissingFileSystem {
                        device: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// An explicitly empty mode is only meaningful as "unset"; reject it when
/// the document spells it out.
pub struct ModeValidator {}

impl ModeValidator {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for ModeValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for ModeValidator {
    fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        if config.defaults.mode == Some(Mode::Empty) {
            return Err(ValidationError::EmptyModeGlobal { scope: "defaults" });
        }
        if config.overrides.mode == Some(Mode::Empty) {
            return Err(ValidationError::EmptyModeGlobal { scope: "-mode" });
        }
        for (name, spec) in &config.devices {
            if spec.mode == Some(Mode::Empty) {
                return Err(ValidationError::EmptyModeDevice {
                    device: name.clone(),
                });
            }
        }
        Ok(())
    }
}

pub struct ResizeThresholdValidator {}

impl ResizeThresholdValidator {
    pub fn new() -> Self {
        Self {}
    }

    fn is_valid(threshold: f64) -> bool {
        (0.0..=100.0).contains(&threshold)
    }
}

impl Default for ResizeThresholdValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for ResizeThresholdValidator {
    fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        if let Some(value) = config.defaults.resize_threshold {
            if !Self::is_valid(value) {
                return Err(ValidationError::ResizeThresholdGlobal {
                    scope: "defaults",
                    value,
                });
            }
        }
        if let Some(value) = config.overrides.resize_threshold {
            if !Self::is_valid(value) {
                return Err(ValidationError::ResizeThresholdGlobal {
                    scope: "-resize-threshold",
                    value,
                });
            }
        }
        for (name, spec) in &config.devices {
            if let Some(value) = spec.resize_threshold {
                if !Self::is_valid(value) {
                    return Err(ValidationError::ResizeThresholdDevice {
                        device: name.clone(),
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

pub struct LvmConsumptionValidator {}

impl LvmConsumptionValidator {
    pub fn new() -> Self {
        Self {}
    }

    fn is_valid(consumption: u64) -> bool {
        consumption <= 100
    }
}

impl Default for LvmConsumptionValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for LvmConsumptionValidator {
    fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        if let Some(value) = config.defaults.lvm_consumption {
            if !Self::is_valid(value) {
                return Err(ValidationError::LvmConsumptionGlobal {
                    scope: "defaults",
                    value,
                });
            }
        }
        if let Some(value) = config.overrides.lvm_consumption {
            if !Self::is_valid(value) {
                return Err(ValidationError::LvmConsumptionGlobal {
                    scope: "-lvm-consumption",
                    value,
                });
            }
        }
        for (name, spec) in &config.devices {
            if let Some(value) = spec.lvm_consumption {
                if !Self::is_valid(value) {
                    return Err(ValidationError::LvmConsumptionDevice {
                        device: name.clone(),
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

pub struct MountPointValidator {}

impl MountPointValidator {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for MountPointValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for MountPointValidator {
    fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        for (name, spec) in &config.devices {
            let Some(mount_point) = &spec.mount_point else {
                continue;
            };
            if !mount_point.is_absolute() {
                return Err(ValidationError::MountPointNotAbsolute {
                    device: name.clone(),
                    path: mount_point.to_string(),
                });
            }
            if mount_point.as_str() == "/" {
                return Err(ValidationError::MountPointIsRoot {
                    device: name.clone(),
                });
            }
        }
        Ok(())
    }
}

const REMOUNT_REASON: &str =
    "it prevents unmounted devices from being mounted";
const BIND_REASON: &str = "bind mounts are not supported for block devices";

pub struct MountOptionsValidator {}

impl MountOptionsValidator {
    pub fn new() -> Self {
        Self {}
    }

    fn unsupported_reason(options: &MountOptions) -> Option<&'static str> {
        if options.as_str().contains("remount") {
            return Some(REMOUNT_REASON);
        }
        if options.as_str().contains("bind") {
            return Some(BIND_REASON);
        }
        None
    }
}

impl Default for MountOptionsValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for MountOptionsValidator {
    fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        if let Some(options) = &config.defaults.mount_options {
            if let Some(reason) = Self::unsupported_reason(options) {
                return Err(ValidationError::MountOptionsGlobal {
                    scope: "defaults",
                    options: options.to_string(),
                    reason,
                });
            }
        }
        if let Some(options) = &config.overrides.mount_options {
            if let Some(reason) = Self::unsupported_reason(options) {
                return Err(ValidationError::MountOptionsGlobal {
                    scope: "-mount-options",
                    options: options.to_string(),
                    reason,
                });
            }
        }
        for (name, spec) in &config.devices {
            if let Some(options) = &spec.mount_options {
                if let Some(reason) = Self::unsupported_reason(options) {
                    return Err(ValidationError::MountOptionsDevice {
                        device: name.clone(),
                        options: options.to_string(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every named user and group must resolve on this host.
pub struct OwnerValidator {
    owner_service: Arc<dyn OwnerService>,
}

impl OwnerValidator {
    pub fn new(owner_service: Arc<dyn OwnerService>) -> Self {
        Self { owner_service }
    }
}

impl Validator for OwnerValidator {
    fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        for spec in config.devices.values() {
            if let Some(user) = &spec.user {
                self.owner_service.get_user(user)?;
            }
            if let Some(group) = &spec.group {
                self.owner_service.get_group(group)?;
            }
        }
        Ok(())
    }
}

/// Every configured device must exist on the host.
pub struct DeviceValidator {
    device_service: Arc<dyn DeviceService>,
}

impl DeviceValidator {
    pub fn new(device_service: Arc<dyn DeviceService>) -> Self {
        Self { device_service }
    }
}

impl Validator for DeviceValidator {
    fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        for name in config.devices.keys() {
            self.device_service.get_block_device(name)?;
        }
        Ok(())
    }
}
