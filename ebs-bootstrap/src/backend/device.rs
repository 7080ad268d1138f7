// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::{Action, ActionKind};
use crate::backend::BackendError;
use crate::config::Config;
use crate::model::{BlockDevice, FileSystem, MountOptions};
use crate::service::{DeviceService, FileSystemServiceFactory};
use camino::Utf8Path;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cache of the configured block devices, plus the filesystem-specific
/// policies (label length, mount requirements) that shape label and resize
/// plans.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceBackend {
    fn get_block_device(
        &self,
        device: &str,
    ) -> Result<BlockDevice, BackendError>;

    /// The action sequence that applies `label`. Filesystems that cannot be
    /// labelled while mounted get an unmount action prepended when the
    /// device is currently mounted.
    fn label(
        &self,
        device: &BlockDevice,
        label: &str,
    ) -> Result<Vec<Action>, BackendError>;

    /// The resize action for a device. The target is the device node
    /// unless the filesystem resizes through its mount point, in which
    /// case the device must currently be mounted.
    fn resize(&self, device: &BlockDevice) -> Result<Action, BackendError>;

    fn format(
        &self,
        device: &BlockDevice,
        file_system: FileSystem,
    ) -> Result<Action, BackendError>;

    fn mount(
        &self,
        device: &BlockDevice,
        target: &Utf8Path,
        options: &MountOptions,
    ) -> Action;

    /// A mount action whose options have passed through the remount
    /// derivation.
    fn remount(
        &self,
        device: &BlockDevice,
        target: &Utf8Path,
        options: &MountOptions,
    ) -> Action;

    fn umount(&self, device: &BlockDevice) -> Action;

    fn refresh(&mut self, config: &Config) -> Result<(), BackendError>;
}

pub struct LinuxDeviceBackend {
    block_devices: BTreeMap<String, BlockDevice>,
    device_service: Arc<dyn DeviceService>,
    file_system_service_factory: Arc<dyn FileSystemServiceFactory>,
}

impl LinuxDeviceBackend {
    pub fn new(
        device_service: Arc<dyn DeviceService>,
        file_system_service_factory: Arc<dyn FileSystemServiceFactory>,
    ) -> Self {
        Self {
            block_devices: BTreeMap::new(),
            device_service,
            file_system_service_factory,
        }
    }
}

impl DeviceBackend for LinuxDeviceBackend {
    fn get_block_device(
        &self,
        device: &str,
    ) -> Result<BlockDevice, BackendError> {
        self.block_devices.get(device).cloned().ok_or_else(|| {
            BackendError::BlockDeviceNotFound { device: device.to_string() }
        })
    }

    fn label(
        &self,
        device: &BlockDevice,
        label: &str,
    ) -> Result<Vec<Action>, BackendError> {
        let service = self
            .file_system_service_factory
            .select(device.file_system)
            .map_err(|source| BackendError::FileSystem {
                device: device.name.clone(),
                source,
            })?;
        let maximum = service.maximum_label_length();
        if label.len() > maximum {
            return Err(BackendError::LabelTooLong {
                device: device.name.clone(),
                label: label.to_string(),
                maximum,
                file_system: service.file_system(),
            });
        }
        let mut actions = Vec::new();
        if service.label_requires_unmount() && device.mount_point.is_some() {
            actions.push(self.umount(device));
        }
        actions.push(Action::new(ActionKind::LabelDevice {
            device: device.name.clone(),
            file_system: device.file_system,
            label: label.to_string(),
        }));
        Ok(actions)
    }

    fn resize(&self, device: &BlockDevice) -> Result<Action, BackendError> {
        let service = self
            .file_system_service_factory
            .select(device.file_system)
            .map_err(|source| BackendError::FileSystem {
                device: device.name.clone(),
                source,
            })?;
        let target = if service.resize_requires_mount() {
            match &device.mount_point {
                Some(mount_point) => mount_point.to_string(),
                None => {
                    return Err(BackendError::ResizeRequiresMount {
                        device: device.name.clone(),
                        file_system: service.file_system(),
                    });
                }
            }
        } else {
            device.name.clone()
        };
        Ok(Action::new(ActionKind::ResizeFileSystem {
            device: device.name.clone(),
            target,
            file_system: device.file_system,
        }))
    }

    fn format(
        &self,
        device: &BlockDevice,
        file_system: FileSystem,
    ) -> Result<Action, BackendError> {
        // Selecting the service up front rejects formatting targets the
        // tool cannot create.
        self.file_system_service_factory.select(file_system).map_err(
            |source| BackendError::FileSystem {
                device: device.name.clone(),
                source,
            },
        )?;
        Ok(Action::new(ActionKind::FormatDevice {
            device: device.name.clone(),
            file_system,
        }))
    }

    fn mount(
        &self,
        device: &BlockDevice,
        target: &Utf8Path,
        options: &MountOptions,
    ) -> Action {
        Action::new(ActionKind::MountDevice {
            source: device.name.clone(),
            target: target.to_path_buf(),
            file_system: device.file_system,
            options: options.clone(),
        })
    }

    fn remount(
        &self,
        device: &BlockDevice,
        target: &Utf8Path,
        options: &MountOptions,
    ) -> Action {
        self.mount(device, target, &options.remount())
    }

    fn umount(&self, device: &BlockDevice) -> Action {
        Action::new(ActionKind::UnmountDevice {
            source: device.name.clone(),
            target: device.mount_point.clone().unwrap_or_default(),
        })
    }

    fn refresh(&mut self, config: &Config) -> Result<(), BackendError> {
        self.block_devices = BTreeMap::new();

        let mut block_devices = BTreeMap::new();
        for name in config.devices.keys() {
            let device = self.device_service.get_block_device(name)?;
            block_devices.insert(device.name.clone(), device);
        }
        self.block_devices = block_devices;
        Ok(())
    }
}
