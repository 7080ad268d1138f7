// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The closed set of host utilities the tool is allowed to invoke.

use std::fmt;
use std::process::Command;

/// A host utility, addressed by bare name and resolved against `$PATH` on
/// first use (see [`crate::process::HostExecutor`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Utility {
    Lsblk,
    BlockDev,
    MkfsExt4,
    E2Label,
    Tune2fs,
    Resize2fs,
    MkfsXfs,
    XfsAdmin,
    XfsInfo,
    XfsGrowfs,
    Mount,
    Umount,
    Pvs,
    Vgs,
    Lvs,
    PvCreate,
    VgCreate,
    LvCreate,
    LvChange,
    PvResize,
    LvExtend,
}

impl Utility {
    pub fn name(&self) -> &'static str {
        match self {
            Utility::Lsblk => "lsblk",
            Utility::BlockDev => "blockdev",
            Utility::MkfsExt4 => "mkfs.ext4",
            Utility::E2Label => "e2label",
            Utility::Tune2fs => "tune2fs",
            Utility::Resize2fs => "resize2fs",
            Utility::MkfsXfs => "mkfs.xfs",
            Utility::XfsAdmin => "xfs_admin",
            Utility::XfsInfo => "xfs_info",
            Utility::XfsGrowfs => "xfs_growfs",
            Utility::Mount => "mount",
            Utility::Umount => "umount",
            Utility::Pvs => "pvs",
            Utility::Vgs => "vgs",
            Utility::Lvs => "lvs",
            Utility::PvCreate => "pvcreate",
            Utility::VgCreate => "vgcreate",
            Utility::LvCreate => "lvcreate",
            Utility::LvChange => "lvchange",
            Utility::PvResize => "pvresize",
            Utility::LvExtend => "lvextend",
        }
    }

    /// Builds a [`Command`] invoking this utility with the given arguments.
    pub fn command<S: AsRef<str>>(&self, args: &[S]) -> Command {
        let mut command = Command::new(self.name());
        command.args(args.iter().map(|s| s.as_ref()));
        command
    }
}

impl fmt::Display for Utility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
