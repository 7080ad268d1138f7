// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The convergence pipeline.
//!
//! A [`Layer`] owns one conceptual slice of host state and runs in four
//! phases: refresh its backends, plan actions, execute them, and validate
//! that the host converged. The [`ExponentialBackoffLayerExecutor`] drives
//! the layers in declared order and retries the validation phase on a
//! deterministic backoff schedule, because some host-side effects (udev
//! settles, mount-table updates) land moments after the mutating utility
//! exits.

mod directory;
mod format;
mod label;
mod lv;
mod lv_activate;
mod lv_resize;
mod mount;
mod owner;
mod permissions;
mod pv;
mod pv_resize;
mod resize;
mod vg;

pub use directory::CreateDirectoryLayer;
pub use format::FormatDeviceLayer;
pub use label::LabelDeviceLayer;
pub use lv::CreateLogicalVolumeLayer;
pub use lv_activate::ActivateLogicalVolumeLayer;
pub use lv_resize::ResizeLogicalVolumeLayer;
pub use mount::MountDeviceLayer;
pub use owner::ChangeOwnerLayer;
pub use permissions::ChangePermissionsLayer;
pub use pv::CreatePhysicalVolumeLayer;
pub use pv_resize::ResizePhysicalVolumeLayer;
pub use resize::ResizeDeviceLayer;
pub use vg::CreateVolumeGroupLayer;

use crate::action::{Action, ActionError, ActionExecutor};
use crate::backend::BackendError;
use crate::config::Config;
use crate::model::{FilePermissions, FileSystem};
use camino::Utf8PathBuf;
use ebs_bootstrap_common::backoff::{
    retry, retry_policy_validation, BackoffError, RetryParameters,
};

#[derive(thiserror::Error, Debug)]
pub enum LayerError {
    #[error("{device}: Can not erase the file system of a device")]
    EraseRefused { device: String },

    #[error(
        "{device}: Can not format a device with an existing {file_system} \
         file system"
    )]
    FormatRefused { device: String, file_system: FileSystem },

    #[error(
        "{device}: Failed file system validation checks. Expected={expected}, \
         Actual={actual}"
    )]
    FileSystemMismatch {
        device: String,
        expected: FileSystem,
        actual: FileSystem,
    },

    #[error(
        "{device}: Failed label validation checks. Expected={expected}, \
         Actual={actual}"
    )]
    LabelMismatch { device: String, expected: String, actual: String },

    #[error(
        "{device}: {path} must be a directory for a device to be mounted to it"
    )]
    MountPointNotDirectory { device: String, path: Utf8PathBuf },

    #[error(
        "{device}: Failed directory validation checks. {path} does not exist \
         or is not a directory"
    )]
    DirectoryValidation { device: String, path: Utf8PathBuf },

    #[error("{device}: Can not mount a device with no file system")]
    MountUnformatted { device: String },

    #[error(
        "{device}: {path} must exist as a directory before it can be mounted"
    )]
    MountTargetMissing { device: String, path: Utf8PathBuf },

    #[error("{device}: {path} is already mounted by another device")]
    MountPointTaken { device: String, path: Utf8PathBuf },

    #[error(
        "{device}: Failed mountpoint validation checks. Device not mounted \
         to {path}"
    )]
    MountValidation { device: String, path: Utf8PathBuf },

    #[error("{path} is either not a directory or does not exist")]
    NotADirectory { path: Utf8PathBuf },

    #[error(
        "{device}: Failed ownership validation checks. {path} is either not \
         a directory or does not exist"
    )]
    OwnershipDirectoryValidation { device: String, path: Utf8PathBuf },

    #[error(
        "{device}: Failed ownership validation checks. {path} User \
         Expected={expected}, Actual={actual}"
    )]
    UserMismatch {
        device: String,
        path: Utf8PathBuf,
        expected: u32,
        actual: u32,
    },

    #[error(
        "{device}: Failed ownership validation checks. {path} Group \
         Expected={expected}, Actual={actual}"
    )]
    GroupMismatch {
        device: String,
        path: Utf8PathBuf,
        expected: u32,
        actual: u32,
    },

    #[error(
        "{device}: Failed permissions validation checks. {path} Permissions \
         Expected={expected}, Actual={actual}"
    )]
    PermissionsMismatch {
        device: String,
        path: Utf8PathBuf,
        expected: FilePermissions,
        actual: FilePermissions,
    },

    #[error(
        "{device}: Failed to resize file system. File \
         System={file_system_size} Block Device={block_device_size} (bytes)"
    )]
    ResizeValidation {
        device: String,
        file_system_size: u64,
        block_device_size: u64,
    },

    #[error(
        "{device}: Can not create a physical volume on a device with an \
         existing {file_system} file system"
    )]
    PhysicalVolumeOnFormattedDevice {
        device: String,
        file_system: FileSystem,
    },

    #[error(
        "{device}: Failed physical volume validation checks. \
         Expected={expected}, Actual={actual}"
    )]
    PhysicalVolumeValidation {
        device: String,
        expected: FileSystem,
        actual: FileSystem,
    },

    #[error(
        "{device}: Physical volume {device} already has volume group \
         {volume_group} associated"
    )]
    PhysicalVolumeHasGroup { device: String, volume_group: String },

    #[error(
        "{device}: Volume group {volume_group} already exists and belongs \
         to physical volume {physical_volume}"
    )]
    VolumeGroupOnOtherVolume {
        device: String,
        volume_group: String,
        physical_volume: String,
    },

    #[error(
        "{device}: Cannot manage volume group {volume_group} because it is \
         associated with more than one physical volume"
    )]
    VolumeGroupSpansVolumes { device: String, volume_group: String },

    #[error(
        "{device}: Failed to validate volume group. Expected={expected}, \
         Actual={actual}"
    )]
    VolumeGroupValidation {
        device: String,
        expected: String,
        actual: String,
    },

    #[error(
        "{device}: Failed to validate volume group. #(Physical volume) \
         Expected=1, Actual={actual}"
    )]
    VolumeGroupCountValidation { device: String, actual: usize },

    #[error(
        "{device}: Volume group {volume_group} already has logical volume \
         {logical_volume} associated"
    )]
    VolumeGroupHasVolume {
        device: String,
        volume_group: String,
        logical_volume: String,
    },

    #[error(
        "{device}: Cannot manage volume group {volume_group} with more than \
         one logical volume associated"
    )]
    VolumeGroupHasVolumes { device: String, volume_group: String },

    #[error(
        "{device}: Failed to validate logical volume. Expected={expected}, \
         Actual={actual}"
    )]
    LogicalVolumeValidation {
        device: String,
        expected: String,
        actual: String,
    },

    #[error(
        "{device}: Failed to validate logical volume. #(Logical Volume) \
         Expected=1, Actual={actual}"
    )]
    LogicalVolumeCountValidation { device: String, actual: usize },

    #[error(
        "{name}: Can not activate a logical volume in an unsupported state"
    )]
    LogicalVolumeUnsupported { name: String },

    #[error(
        "{device}: Failed resize validation checks. Physical volume {device} \
         still needs to be resized"
    )]
    PhysicalVolumeResizeValidation { device: String },

    #[error(
        "{device}: Failed resize validation checks. Logical volume \
         {logical_volume} still needs to be resized"
    )]
    LogicalVolumeResizeValidation { device: String, logical_volume: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A four-phase unit of convergence over one slice of host state.
pub trait Layer {
    /// Repopulates the backend caches this layer reads.
    fn refresh(&self, config: &Config) -> Result<(), LayerError>;

    /// Derives the ordered action list that would converge the host.
    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError>;

    /// Checks the host against the desired state; called (with a fresh
    /// refresh) until it succeeds or the retry budget runs out.
    fn validate(&self, config: &Config) -> Result<(), LayerError>;

    /// Advisory printed once when the plan is non-empty.
    fn warning(&self) -> Option<&'static str>;

    /// Whether the config gives this layer anything to do. Layers whose
    /// refresh probes optional host subsystems (LVM) use this to avoid
    /// probing when no device asks for them.
    fn should_process(&self, _config: &Config) -> bool {
        true
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LayerExecutorError {
    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Drives layers in declared order, re-validating each on a deterministic
/// exponential backoff schedule.
pub struct ExponentialBackoffLayerExecutor {
    retry_parameters: RetryParameters,
    action_executor: ActionExecutor,
}

impl ExponentialBackoffLayerExecutor {
    pub fn new(
        action_executor: ActionExecutor,
        retry_parameters: RetryParameters,
    ) -> Self {
        Self { retry_parameters, action_executor }
    }

    pub fn execute(
        &mut self,
        layers: &[Box<dyn Layer>],
        config: &Config,
    ) -> Result<(), LayerExecutorError> {
        for layer in layers {
            if !layer.should_process(config) {
                continue;
            }
            layer.refresh(config)?;
            let actions = layer.plan(config)?;
            if !actions.is_empty() {
                if let Some(warning) = layer.warning() {
                    println!("🟠 {warning}");
                }
            }
            self.action_executor.execute_all(&actions)?;

            // Errors out of refresh reflect misconfiguration or a host
            // condition that seconds of waiting will not heal; they are
            // marked permanent so they bypass the backoff.
            let policy = retry_policy_validation(&self.retry_parameters);
            retry(policy, || {
                layer.refresh(config).map_err(BackoffError::permanent)?;
                layer.validate(config).map_err(BackoffError::transient)
            })
            .map_err(|err| match err {
                BackoffError::Permanent(err) => err,
                BackoffError::Transient { err, .. } => err,
            })?;
        }
        Ok(())
    }
}
