// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed wrappers over the host utilities and operating-system facilities.
//!
//! Every service is a trait so the backends above them can be tested against
//! mocks; the production implementations delegate to `linux-utils`.

mod device;
mod file;
mod filesystem;
mod lvm;
mod nvme;
mod owner;

pub use device::{DeviceService, LinuxDeviceService};
pub use file::{FileService, UnixFileService};
pub use filesystem::{
    Ext4Service, FileSystemService, FileSystemServiceFactory,
    LinuxFileSystemServiceFactory, XfsService,
};
pub use lvm::{LinuxLvmService, LvmService};
pub use nvme::{AwsNitroNVMeService, NVMeService};
pub use owner::{OwnerService, UnixOwnerService};

#[cfg(test)]
pub use device::MockDeviceService;
#[cfg(test)]
pub use file::MockFileService;
#[cfg(test)]
pub use filesystem::{MockFileSystemService, MockFileSystemServiceFactory};
#[cfg(test)]
pub use lvm::MockLvmService;
#[cfg(test)]
pub use nvme::MockNVMeService;
#[cfg(test)]
pub use owner::MockOwnerService;

use crate::model::{FileSystem, ParseFileSystemError};
use camino::Utf8PathBuf;

/// Errors surfaced by the service ring.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Execution(#[from] linux_utils::ExecutionError),

    #[error(transparent)]
    ListBlockDevices(#[from] linux_utils::lsblk::ListBlockDevicesError),

    #[error("{device}: {source}")]
    ProbeBlockDevice {
        device: String,
        source: linux_utils::lsblk::ProbeBlockDeviceError,
    },

    #[error(transparent)]
    BlockDeviceSize(#[from] linux_utils::blockdev::GetSizeError),

    #[error(transparent)]
    Ext4Size(#[from] linux_utils::e2fs::GetSizeError),

    #[error(transparent)]
    XfsSize(#[from] linux_utils::xfs::GetSizeError),

    #[error(transparent)]
    LvmReport(#[from] linux_utils::lvm::ReportError),

    #[error(transparent)]
    NvmeIdentify(#[from] linux_utils::nvme::IdentifyError),

    #[error("{device}: {source}")]
    ParseFileSystem { device: String, source: ParseFileSystemError },

    #[error("An unformatted file system can not be queried/modified")]
    UnformattedFileSystem,

    #[error("Support for querying/modifying the '{0}' filesystem is lacking")]
    UnsupportedFileSystem(FileSystem),

    #[error("User (name={0}) does not exist")]
    UserNameNotFound(String),

    #[error("User (id={0}) does not exist")]
    UserIdNotFound(u32),

    #[error("Group (name={0}) does not exist")]
    GroupNameNotFound(String),

    #[error("Group (id={0}) does not exist")]
    GroupIdNotFound(u32),

    #[error("Could not get current user")]
    CurrentUser,

    #[error("{path}: {source}")]
    Io { path: Utf8PathBuf, source: std::io::Error },

    #[error(
        "{device}: Instance-store vendor specific metadata did not match \
         pattern. Pattern={pattern}, Actual={actual}"
    )]
    InstanceStoreMetadata {
        device: String,
        pattern: &'static str,
        actual: String,
    },

    #[error("{0} is not an AWS-managed NVME device")]
    NotAwsManagedNvme(String),
}

impl ServiceError {
    /// True for a stat of a path that simply does not exist, which several
    /// callers treat as an ordinary (non-error) outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
