// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the engine.

mod device;
mod file;
mod filesystem;
mod lvm;
mod mode;
mod owner;

pub use device::{BlockDevice, BlockDeviceMetrics, MountOptions};
pub use file::{File, FilePermissions, FileType};
pub use filesystem::{FileSystem, ParseFileSystemError};
pub use lvm::{
    LogicalVolume, LvmDevice, LvmKind, LvmState, PhysicalVolume, VolumeGroup,
};
pub use mode::{Mode, ParseModeError};
pub use owner::{Group, User};
