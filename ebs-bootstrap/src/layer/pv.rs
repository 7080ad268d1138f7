// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::{DeviceBackend, LvmBackend};
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use crate::model::FileSystem;
use std::cell::RefCell;
use std::rc::Rc;

/// Creates a physical volume on each device destined for LVM. A device
/// carrying any other filesystem is refused.
pub struct CreatePhysicalVolumeLayer {
    device_backend: Rc<RefCell<dyn DeviceBackend>>,
    lvm_backend: Rc<RefCell<dyn LvmBackend>>,
}

impl CreatePhysicalVolumeLayer {
    pub fn new(
        device_backend: Rc<RefCell<dyn DeviceBackend>>,
        lvm_backend: Rc<RefCell<dyn LvmBackend>>,
    ) -> Self {
        Self { device_backend, lvm_backend }
    }
}

impl Layer for CreatePhysicalVolumeLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        // The LVM backend stays cold: deciding whether to create a physical
        // volume only needs the device probe.
        Ok(self.device_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let device_backend = self.device_backend.borrow();
        let lvm_backend = self.lvm_backend.borrow();
        let mut actions = Vec::new();
        for (name, spec) in &config.devices {
            if spec.lvm.is_none() {
                continue;
            }
            let device = device_backend.get_block_device(name)?;
            if device.file_system == FileSystem::LvmMember {
                continue;
            }
            if device.file_system != FileSystem::Unformatted {
                return Err(LayerError::PhysicalVolumeOnFormattedDevice {
                    device: device.name.clone(),
                    file_system: device.file_system,
                });
            }
            let action = lvm_backend
                .create_physical_volume(&device.name)
                .with_mode(config.mode(name));
            actions.push(action);
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let device_backend = self.device_backend.borrow();
        for (name, spec) in &config.devices {
            if spec.lvm.is_none() {
                continue;
            }
            let device = device_backend.get_block_device(name)?;
            if device.file_system != FileSystem::LvmMember {
                return Err(LayerError::PhysicalVolumeValidation {
                    device: device.name.clone(),
                    expected: FileSystem::LvmMember,
                    actual: device.file_system,
                });
            }
        }
        Ok(())
    }

    fn warning(&self) -> Option<&'static str> {
        None
    }

    fn should_process(&self, config: &Config) -> bool {
        config.devices.values().any(|spec| spec.lvm.is_some())
    }
}
