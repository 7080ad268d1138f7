// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::{Action, ActionKind};
use crate::backend::lvm_graph::LvmGraph;
use crate::backend::BackendError;
use crate::config::Config;
use crate::model::{LogicalVolume, LvmKind, VolumeGroup};
use crate::service::LvmService;
use std::sync::Arc;

// The % threshold at which to resize a physical volume.
//
// The smallest gp3 EBS volume is 1 GiB (1073741824 bytes) and the default
// extent size of a physical volume is 4 MiB, with the first extent
// reserved for metadata. That produces a PV of 1069547520 bytes
// (99.6093% of its device), so anything under 99.6% indicates the device
// has grown under the PV. A fixed byte difference would not survive
// non-default extent sizes.
const PHYSICAL_VOLUME_RESIZE_THRESHOLD: f64 = 99.6;

// The ± tolerance (in percentage points) around the requested
// percent-of-group figure within which a logical volume is left alone.
// `lvcreate -l 20%VG` lands on something like 20.0052% once extents round,
// so an exact comparison would resize on every run; above the band the
// operator is asking for a downsize, which is destructive and refused.
const LOGICAL_VOLUME_RESIZE_TOLERANCE: f64 = 0.1;

/// Structural queries over the LVM graph plus constructors for the six LVM
/// mutations.
#[cfg_attr(test, mockall::automock)]
pub trait LvmBackend {
    fn create_physical_volume(&self, device: &str) -> Action;

    fn create_volume_group(
        &self,
        name: &str,
        physical_volume: &str,
    ) -> Action;

    fn create_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Action;

    fn activate_logical_volume(&self, name: &str, volume_group: &str)
        -> Action;

    /// One record per parent physical volume of the named group; empty when
    /// the group does not exist.
    fn get_volume_groups(&self, name: &str) -> Vec<VolumeGroup>;

    fn get_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
    ) -> Result<LogicalVolume, BackendError>;

    /// All logical volumes in a group; empty when the group does not exist.
    fn search_logical_volumes(&self, volume_group: &str) -> Vec<LogicalVolume>;

    /// The unique volume group attached to a physical volume, if any.
    fn search_volume_group(&self, physical_volume: &str) -> Option<VolumeGroup>;

    fn should_resize_physical_volume(
        &self,
        name: &str,
    ) -> Result<bool, BackendError>;

    fn resize_physical_volume(&self, name: &str) -> Action;

    /// Resize policy for a logical volume against its target
    /// percent-of-group: within tolerance, no-op; below, resize up; above,
    /// an error (downsizing is destructive).
    fn should_resize_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Result<bool, BackendError>;

    fn resize_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Action;

    fn refresh(&mut self, config: &Config) -> Result<(), BackendError>;
}

pub struct LinuxLvmBackend {
    graph: LvmGraph,
    lvm_service: Arc<dyn LvmService>,
}

impl LinuxLvmBackend {
    pub fn new(lvm_service: Arc<dyn LvmService>) -> Self {
        Self { graph: LvmGraph::new(), lvm_service }
    }
}

impl LvmBackend for LinuxLvmBackend {
    fn create_physical_volume(&self, device: &str) -> Action {
        Action::new(ActionKind::CreatePhysicalVolume {
            device: device.to_string(),
        })
    }

    fn create_volume_group(
        &self,
        name: &str,
        physical_volume: &str,
    ) -> Action {
        Action::new(ActionKind::CreateVolumeGroup {
            name: name.to_string(),
            physical_volume: physical_volume.to_string(),
        })
    }

    fn create_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Action {
        Action::new(ActionKind::CreateLogicalVolume {
            name: name.to_string(),
            volume_group: volume_group.to_string(),
            volume_group_percent,
        })
    }

    fn activate_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
    ) -> Action {
        Action::new(ActionKind::ActivateLogicalVolume {
            name: name.to_string(),
            volume_group: volume_group.to_string(),
        })
    }

    fn get_volume_groups(&self, name: &str) -> Vec<VolumeGroup> {
        let Ok(vg) = self.graph.get_volume_group(name) else {
            return Vec::new();
        };
        self.graph
            .get_parents(vg, LvmKind::PhysicalVolume)
            .into_iter()
            .map(|pv| VolumeGroup {
                name: vg.name.clone(),
                physical_volume: pv.name.clone(),
                state: vg.state,
                size: vg.size,
            })
            .collect()
    }

    fn get_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
    ) -> Result<LogicalVolume, BackendError> {
        let lv = self.graph.get_logical_volume(name, volume_group)?;
        let groups = self.graph.get_parents(lv, LvmKind::VolumeGroup);
        let Some(vg) = groups.first() else {
            return Err(BackendError::LogicalVolumeWithoutGroup {
                name: lv.name.clone(),
            });
        };
        Ok(LogicalVolume {
            name: lv.name.clone(),
            volume_group: vg.name.clone(),
            state: lv.state,
            size: lv.size,
        })
    }

    fn search_logical_volumes(&self, volume_group: &str) -> Vec<LogicalVolume> {
        let Ok(vg) = self.graph.get_volume_group(volume_group) else {
            return Vec::new();
        };
        self.graph
            .get_children(vg, LvmKind::LogicalVolume)
            .into_iter()
            .map(|lv| LogicalVolume {
                name: lv.name.clone(),
                volume_group: vg.name.clone(),
                state: lv.state,
                size: lv.size,
            })
            .collect()
    }

    fn search_volume_group(
        &self,
        physical_volume: &str,
    ) -> Option<VolumeGroup> {
        let pv = self.graph.get_physical_volume(physical_volume).ok()?;
        let groups = self.graph.get_children(pv, LvmKind::VolumeGroup);
        let vg = groups.first()?;
        Some(VolumeGroup {
            name: vg.name.clone(),
            physical_volume: pv.name.clone(),
            state: vg.state,
            size: vg.size,
        })
    }

    fn should_resize_physical_volume(
        &self,
        name: &str,
    ) -> Result<bool, BackendError> {
        let Ok(pv) = self.graph.get_physical_volume(name) else {
            return Ok(false);
        };
        let devices = self.graph.get_parents(pv, LvmKind::Device);
        let Some(device) = devices.first() else {
            return Ok(false);
        };
        Ok((pv.size as f64) / (device.size as f64) * 100.0
            < PHYSICAL_VOLUME_RESIZE_THRESHOLD)
    }

    fn resize_physical_volume(&self, name: &str) -> Action {
        Action::new(ActionKind::ResizePhysicalVolume {
            name: name.to_string(),
        })
    }

    fn should_resize_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Result<bool, BackendError> {
        let lower = volume_group_percent as f64 - LOGICAL_VOLUME_RESIZE_TOLERANCE;
        let upper = volume_group_percent as f64 + LOGICAL_VOLUME_RESIZE_TOLERANCE;
        let lv = self.graph.get_logical_volume(name, volume_group)?;
        let groups = self.graph.get_parents(lv, LvmKind::VolumeGroup);
        let Some(vg) = groups.first() else {
            return Err(BackendError::LogicalVolumeWithoutGroup {
                name: name.to_string(),
            });
        };
        let used = (lv.size as f64) / (vg.size as f64) * 100.0;
        if used > upper {
            return Err(BackendError::LogicalVolumeOversized {
                name: name.to_string(),
                volume_group: volume_group.to_string(),
                used,
                expected: volume_group_percent,
            });
        }
        Ok(used < lower)
    }

    fn resize_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Action {
        Action::new(ActionKind::ResizeLogicalVolume {
            name: name.to_string(),
            volume_group: volume_group.to_string(),
            volume_group_percent,
        })
    }

    fn refresh(&mut self, _config: &Config) -> Result<(), BackendError> {
        // The previous graph is discarded up front: a failure below must
        // not leave layers reasoning against torn state.
        self.graph = LvmGraph::new();

        let mut graph = LvmGraph::new();
        for device in self.lvm_service.get_devices()? {
            graph.add_device(&device.name, device.size)?;
        }
        for pv in self.lvm_service.get_physical_volumes()? {
            graph.add_physical_volume(&pv.name, pv.size)?;
        }
        for vg in self.lvm_service.get_volume_groups()? {
            graph.add_volume_group(&vg.name, &vg.physical_volume, vg.size)?;
        }
        for lv in self.lvm_service.get_logical_volumes()? {
            graph.add_logical_volume(
                &lv.name,
                &lv.volume_group,
                lv.state,
                lv.size,
            )?;
        }
        self.graph = graph;
        Ok(())
    }
}
