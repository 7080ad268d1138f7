// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Records and states for the four levels of the LVM topology.

/// Liveness-and-kind state of a node in the LVM graph.
///
/// The discriminants form a bitmask: each kind owns a disjoint set of bits,
/// so a single mask can select on kind, on liveness, or both (see
/// [`LvmKind`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LvmState {
    DeviceActive = 1 << 0,
    PhysicalVolumeActive = 1 << 1,
    VolumeGroupInactive = 1 << 2,
    VolumeGroupActive = 1 << 3,
    LogicalVolumeInactive = 1 << 4,
    LogicalVolumeActive = 1 << 5,
    LogicalVolumeUnsupported = 1 << 6,
}

/// Bitmask over [`LvmState`] selecting every state a given node kind can be
/// in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LvmKind {
    Device = 1 << 0,
    PhysicalVolume = 1 << 1,
    VolumeGroup = (1 << 2) | (1 << 3),
    LogicalVolume = (1 << 4) | (1 << 5) | (1 << 6),
}

impl LvmState {
    /// Whether this state belongs to a node of the given kind.
    pub fn is_kind(&self, kind: LvmKind) -> bool {
        (*self as u32) & (kind as u32) != 0
    }
}

/// The block device backing a physical volume, as reported by `pvs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LvmDevice {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalVolume {
    pub name: String,
    pub size: u64,
}

/// One (volume group, parent physical volume) pairing. A spanned volume
/// group yields one record per parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeGroup {
    pub name: String,
    pub physical_volume: String,
    pub state: LvmState,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalVolume {
    pub name: String,
    pub volume_group: String,
    pub state: LvmState,
    pub size: u64,
}
