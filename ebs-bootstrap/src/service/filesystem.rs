// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::model::FileSystem;
use crate::service::ServiceError;
use linux_utils::e2fs::Ext4;
use linux_utils::xfs::Xfs;
use linux_utils::BoxedExecutor;
use std::sync::Arc;

/// Filesystem-specific probing and mutation, plus the policy knobs that
/// differ between filesystems (label length ceilings, whether label/resize
/// operations need the device mounted or unmounted).
#[cfg_attr(test, mockall::automock)]
pub trait FileSystemService: std::fmt::Debug {
    fn file_system(&self) -> FileSystem;

    /// Size of the filesystem itself in bytes (not its device).
    fn get_size(&self, device: &str) -> Result<u64, ServiceError>;

    fn format(&self, device: &str) -> Result<(), ServiceError>;

    fn label(&self, device: &str, label: &str) -> Result<(), ServiceError>;

    /// Grows the filesystem to fill its device. For filesystems that resize
    /// through the mount table, `target` is a mount point rather than a
    /// device node.
    fn resize(&self, target: &str) -> Result<(), ServiceError>;

    fn maximum_label_length(&self) -> usize;

    fn resize_requires_mount(&self) -> bool;

    fn label_requires_unmount(&self) -> bool;
}

/// Selects the [`FileSystemService`] for a probed or requested filesystem.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystemServiceFactory {
    fn select(
        &self,
        fs: FileSystem,
    ) -> Result<Arc<dyn FileSystemService>, ServiceError>;
}

pub struct LinuxFileSystemServiceFactory {
    executor: BoxedExecutor,
}

impl LinuxFileSystemServiceFactory {
    pub fn new(executor: BoxedExecutor) -> Self {
        Self { executor }
    }
}

impl FileSystemServiceFactory for LinuxFileSystemServiceFactory {
    fn select(
        &self,
        fs: FileSystem,
    ) -> Result<Arc<dyn FileSystemService>, ServiceError> {
        match fs {
            FileSystem::Ext4 => {
                Ok(Arc::new(Ext4Service::new(self.executor.clone())))
            }
            FileSystem::Xfs => {
                Ok(Arc::new(XfsService::new(self.executor.clone())))
            }
            FileSystem::Unformatted => Err(ServiceError::UnformattedFileSystem),
            FileSystem::LvmMember => {
                Err(ServiceError::UnsupportedFileSystem(fs))
            }
        }
    }
}

pub struct Ext4Service {
    executor: BoxedExecutor,
}

impl std::fmt::Debug for Ext4Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ext4Service").finish_non_exhaustive()
    }
}

impl Ext4Service {
    pub fn new(executor: BoxedExecutor) -> Self {
        Self { executor }
    }
}

impl FileSystemService for Ext4Service {
    fn file_system(&self) -> FileSystem {
        FileSystem::Ext4
    }

    fn get_size(&self, device: &str) -> Result<u64, ServiceError> {
        Ok(Ext4::get_size_bytes(&self.executor, device)?)
    }

    fn format(&self, device: &str) -> Result<(), ServiceError> {
        Ok(Ext4::format(&self.executor, device)?)
    }

    fn label(&self, device: &str, label: &str) -> Result<(), ServiceError> {
        Ok(Ext4::set_label(&self.executor, device, label)?)
    }

    fn resize(&self, target: &str) -> Result<(), ServiceError> {
        Ok(Ext4::resize(&self.executor, target)?)
    }

    fn maximum_label_length(&self) -> usize {
        16
    }

    fn resize_requires_mount(&self) -> bool {
        false
    }

    fn label_requires_unmount(&self) -> bool {
        false
    }
}

pub struct XfsService {
    executor: BoxedExecutor,
}

impl std::fmt::Debug for XfsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XfsService").finish_non_exhaustive()
    }
}

impl XfsService {
    pub fn new(executor: BoxedExecutor) -> Self {
        Self { executor }
    }
}

impl FileSystemService for XfsService {
    fn file_system(&self) -> FileSystem {
        FileSystem::Xfs
    }

    fn get_size(&self, device: &str) -> Result<u64, ServiceError> {
        Ok(Xfs::get_size_bytes(&self.executor, device)?)
    }

    fn format(&self, device: &str) -> Result<(), ServiceError> {
        Ok(Xfs::format(&self.executor, device)?)
    }

    fn label(&self, device: &str, label: &str) -> Result<(), ServiceError> {
        Ok(Xfs::set_label(&self.executor, device, label)?)
    }

    fn resize(&self, target: &str) -> Result<(), ServiceError> {
        Ok(Xfs::grow(&self.executor, target)?)
    }

    fn maximum_label_length(&self) -> usize {
        12
    }

    fn resize_requires_mount(&self) -> bool {
        true
    }

    fn label_requires_unmount(&self) -> bool {
        true
    }
}
