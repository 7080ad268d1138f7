// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State caches hydrated from the services.
//!
//! Each backend exposes idempotent queries, constructors for deferred
//! [`crate::action::Action`]s, and a `refresh(config)` that rebuilds its
//! cache from the live host. A refresh empties the cache on entry, builds
//! into a fresh container, and assigns it only on success, so a failure
//! partway never leaves torn state visible to the layers.

mod device;
mod file;
mod lvm;
mod lvm_graph;
mod metrics;
mod owner;

pub use device::{DeviceBackend, LinuxDeviceBackend};
pub use file::{FileBackend, LinuxFileBackend};
pub use lvm::{LinuxLvmBackend, LvmBackend};
pub use lvm_graph::{LvmGraph, LvmGraphError, LvmNode};
pub use metrics::{DeviceMetricsBackend, LinuxDeviceMetricsBackend};
pub use owner::{LinuxOwnerBackend, OwnerBackend};

#[cfg(test)]
pub use device::MockDeviceBackend;
#[cfg(test)]
pub use file::MockFileBackend;
#[cfg(test)]
pub use lvm::MockLvmBackend;
#[cfg(test)]
pub use metrics::MockDeviceMetricsBackend;
#[cfg(test)]
pub use owner::MockOwnerBackend;

use crate::model::FileSystem;
use crate::service::ServiceError;
use camino::Utf8PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("{device}: Could not find block device")]
    BlockDeviceNotFound { device: String },

    #[error("{device}: Could not find block device metrics")]
    MetricsNotFound { device: String },

    #[error("User {0} does not exist")]
    UserNotFound(String),

    #[error("Group {0} does not exist")]
    GroupNotFound(String),

    #[error("{path}: Directory does not exist")]
    DirectoryNotFound { path: Utf8PathBuf },

    #[error("{path}: File is not a directory")]
    NotADirectory { path: Utf8PathBuf },

    /// A filesystem-specific operation was requested on a device whose
    /// filesystem cannot be queried or modified.
    #[error("{device}: {source}")]
    FileSystem { device: String, source: ServiceError },

    #[error(
        "{device}: Label '{label}' exceeds the maximum {maximum} character \
         length for the {file_system} file system"
    )]
    LabelTooLong {
        device: String,
        label: String,
        maximum: usize,
        file_system: FileSystem,
    },

    #[error(
        "{device}: To resize the {file_system} file system, device must be \
         mounted"
    )]
    ResizeRequiresMount { device: String, file_system: FileSystem },

    #[error("{name}: Logical volume has no volume group")]
    LogicalVolumeWithoutGroup { name: String },

    #[error(
        "{volume_group}: Logical volume {name} is using {used:.0}% of volume \
         group {volume_group}, which exceeds the expected usage of {expected}%"
    )]
    LogicalVolumeOversized {
        name: String,
        volume_group: String,
        used: f64,
        expected: u64,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Graph(#[from] LvmGraphError),
}

impl BackendError {
    /// True when a directory query failed only because nothing exists at
    /// the path yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::DirectoryNotFound { .. })
    }
}
