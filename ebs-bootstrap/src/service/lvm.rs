// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::model::{
    LogicalVolume, LvmDevice, LvmState, PhysicalVolume, VolumeGroup,
};
use crate::service::ServiceError;
use linux_utils::lvm::Lvm;
use linux_utils::BoxedExecutor;

/// Queries and mutations over the host's LVM stack.
#[cfg_attr(test, mockall::automock)]
pub trait LvmService {
    /// The block devices backing physical volumes.
    fn get_devices(&self) -> Result<Vec<LvmDevice>, ServiceError>;

    fn get_physical_volumes(&self) -> Result<Vec<PhysicalVolume>, ServiceError>;

    /// One record per (volume group, parent physical volume) pairing.
    fn get_volume_groups(&self) -> Result<Vec<VolumeGroup>, ServiceError>;

    fn get_logical_volumes(&self) -> Result<Vec<LogicalVolume>, ServiceError>;

    fn create_physical_volume(&self, name: &str) -> Result<(), ServiceError>;

    fn create_volume_group(
        &self,
        name: &str,
        physical_volume: &str,
    ) -> Result<(), ServiceError>;

    fn create_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Result<(), ServiceError>;

    fn activate_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
    ) -> Result<(), ServiceError>;

    fn resize_physical_volume(&self, name: &str) -> Result<(), ServiceError>;

    fn resize_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Result<(), ServiceError>;
}

pub struct LinuxLvmService {
    executor: BoxedExecutor,
}

impl LinuxLvmService {
    pub fn new(executor: BoxedExecutor) -> Self {
        Self { executor }
    }
}

/// Byte 4 of `lv_attr` is the state flag: `a` for active, `-` for inactive.
/// Anything else (suspended, snapshot-invalid, ...) is a state this tool
/// refuses to manage.
fn logical_volume_state(attr: &str) -> LvmState {
    match attr.as_bytes().get(4) {
        Some(b'a') => LvmState::LogicalVolumeActive,
        Some(b'-') => LvmState::LogicalVolumeInactive,
        _ => LvmState::LogicalVolumeUnsupported,
    }
}

impl LvmService for LinuxLvmService {
    fn get_devices(&self) -> Result<Vec<LvmDevice>, ServiceError> {
        let rows = Lvm::list_pv_devices(&self.executor)?;
        Ok(rows
            .into_iter()
            .map(|row| LvmDevice { name: row.pv_name, size: row.dev_size })
            .collect())
    }

    fn get_physical_volumes(&self) -> Result<Vec<PhysicalVolume>, ServiceError> {
        let rows = Lvm::list_physical_volumes(&self.executor)?;
        Ok(rows
            .into_iter()
            .map(|row| PhysicalVolume { name: row.pv_name, size: row.pv_size })
            .collect())
    }

    fn get_volume_groups(&self) -> Result<Vec<VolumeGroup>, ServiceError> {
        let rows = Lvm::list_volume_groups(&self.executor)?;
        Ok(rows
            .into_iter()
            .map(|row| VolumeGroup {
                name: row.vg_name,
                physical_volume: row.pv_name,
                state: LvmState::VolumeGroupInactive,
                size: row.vg_size,
            })
            .collect())
    }

    fn get_logical_volumes(&self) -> Result<Vec<LogicalVolume>, ServiceError> {
        let rows = Lvm::list_logical_volumes(&self.executor)?;
        Ok(rows
            .into_iter()
            .map(|row| LogicalVolume {
                state: logical_volume_state(&row.lv_attr),
                name: row.lv_name,
                volume_group: row.vg_name,
                size: row.lv_size,
            })
            .collect())
    }

    fn create_physical_volume(&self, name: &str) -> Result<(), ServiceError> {
        Ok(Lvm::create_physical_volume(&self.executor, name)?)
    }

    fn create_volume_group(
        &self,
        name: &str,
        physical_volume: &str,
    ) -> Result<(), ServiceError> {
        Ok(Lvm::create_volume_group(&self.executor, name, physical_volume)?)
    }

    fn create_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Result<(), ServiceError> {
        Ok(Lvm::create_logical_volume(
            &self.executor,
            name,
            volume_group,
            volume_group_percent,
        )?)
    }

    fn activate_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
    ) -> Result<(), ServiceError> {
        Ok(Lvm::activate_logical_volume(&self.executor, name, volume_group)?)
    }

    fn resize_physical_volume(&self, name: &str) -> Result<(), ServiceError> {
        Ok(Lvm::resize_physical_volume(&self.executor, name)?)
    }

    fn resize_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Result<(), ServiceError> {
        Ok(Lvm::resize_logical_volume(
            &self.executor,
            name,
            volume_group,
            volume_group_percent,
        )?)
    }
}
