// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::LvmBackend;
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use std::cell::RefCell;
use std::rc::Rc;

/// Creates one logical volume per volume group, named after the group and
/// sized as the configured percentage of it. Groups with foreign or
/// multiple logical volumes are refused.
pub struct CreateLogicalVolumeLayer {
    lvm_backend: Rc<RefCell<dyn LvmBackend>>,
}

impl CreateLogicalVolumeLayer {
    pub fn new(lvm_backend: Rc<RefCell<dyn LvmBackend>>) -> Self {
        Self { lvm_backend }
    }
}

impl Layer for CreateLogicalVolumeLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        Ok(self.lvm_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let backend = self.lvm_backend.borrow();
        let mut actions = Vec::new();
        for (name, spec) in &config.devices {
            let Some(lvm) = &spec.lvm else {
                continue;
            };

            let volumes = backend.search_logical_volumes(lvm);
            match volumes.len() {
                0 => {}
                1 => {
                    if volumes[0].name == *lvm {
                        continue;
                    }
                    return Err(LayerError::VolumeGroupHasVolume {
                        device: name.clone(),
                        volume_group: lvm.clone(),
                        logical_volume: volumes[0].name.clone(),
                    });
                }
                _ => {
                    return Err(LayerError::VolumeGroupHasVolumes {
                        device: name.clone(),
                        volume_group: lvm.clone(),
                    });
                }
            }

            let action = backend
                .create_logical_volume(lvm, lvm, config.lvm_consumption(name))
                .with_mode(config.mode(name));
            actions.push(action);
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let backend = self.lvm_backend.borrow();
        for (name, spec) in &config.devices {
            let Some(lvm) = &spec.lvm else {
                continue;
            };
            let volumes = backend.search_logical_volumes(lvm);
            match volumes.len() {
                1 => {
                    if volumes[0].name == *lvm {
                        continue;
                    }
                    return Err(LayerError::LogicalVolumeValidation {
                        device: name.clone(),
                        expected: lvm.clone(),
                        actual: volumes[0].name.clone(),
                    });
                }
                count => {
                    return Err(LayerError::LogicalVolumeCountValidation {
                        device: name.clone(),
                        actual: count,
                    });
                }
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
