// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::model::{BlockDevice, FileSystem, MountOptions};
use crate::service::ServiceError;
use camino::Utf8Path;
use linux_utils::blockdev::BlockDev;
use linux_utils::lsblk::Lsblk;
use linux_utils::mount::Mounts;
use linux_utils::BoxedExecutor;

/// Block-device listing, probing, and (un)mounting.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceService {
    /// Size of the device in bytes.
    fn get_size(&self, name: &str) -> Result<u64, ServiceError>;

    /// Every top-level block device of the host, as `/dev/<name>` paths.
    fn get_block_devices(&self) -> Result<Vec<String>, ServiceError>;

    /// Probes one device. The supplied name is authoritative: it is carried
    /// into the result even when it is an alias of the kernel's own name.
    fn get_block_device(&self, name: &str) -> Result<BlockDevice, ServiceError>;

    fn mount(
        &self,
        source: &str,
        target: &Utf8Path,
        file_system: FileSystem,
        options: &MountOptions,
    ) -> Result<(), ServiceError>;

    fn umount(&self, target: &Utf8Path) -> Result<(), ServiceError>;
}

pub struct LinuxDeviceService {
    executor: BoxedExecutor,
}

impl LinuxDeviceService {
    pub fn new(executor: BoxedExecutor) -> Self {
        Self { executor }
    }
}

impl DeviceService for LinuxDeviceService {
    fn get_size(&self, name: &str) -> Result<u64, ServiceError> {
        Ok(BlockDev::get_size_bytes(&self.executor, name)?)
    }

    fn get_block_devices(&self) -> Result<Vec<String>, ServiceError> {
        Ok(Lsblk::list_block_devices(&self.executor)?)
    }

    fn get_block_device(&self, name: &str) -> Result<BlockDevice, ServiceError> {
        let probe = Lsblk::probe_block_device(&self.executor, name).map_err(
            |source| ServiceError::ProbeBlockDevice {
                device: name.to_string(),
                source,
            },
        )?;
        let file_system =
            FileSystem::parse(probe.fstype.as_deref().unwrap_or_default())
                .map_err(|source| ServiceError::ParseFileSystem {
                    device: name.to_string(),
                    source,
                })?;
        Ok(BlockDevice {
            name: name.to_string(),
            mount_point: probe.mount_point,
            file_system,
            label: probe.label,
        })
    }

    fn mount(
        &self,
        source: &str,
        target: &Utf8Path,
        file_system: FileSystem,
        options: &MountOptions,
    ) -> Result<(), ServiceError> {
        Ok(Mounts::mount(
            &self.executor,
            source,
            target.as_str(),
            file_system.as_str(),
            options.as_str(),
        )?)
    }

    fn umount(&self, target: &Utf8Path) -> Result<(), ServiceError> {
        Ok(Mounts::umount(&self.executor, target.as_str())?)
    }
}
