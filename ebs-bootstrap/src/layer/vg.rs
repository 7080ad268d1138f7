// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::LvmBackend;
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use std::cell::RefCell;
use std::rc::Rc;

/// Creates the named volume group on each physical volume. Groups that
/// already exist elsewhere, span several volumes, or squat on the volume
/// under another name are refused rather than adopted.
pub struct CreateVolumeGroupLayer {
    lvm_backend: Rc<RefCell<dyn LvmBackend>>,
}

impl CreateVolumeGroupLayer {
    pub fn new(lvm_backend: Rc<RefCell<dyn LvmBackend>>) -> Self {
        Self { lvm_backend }
    }
}

impl Layer for CreateVolumeGroupLayer {
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

            if let Some(vg) = backend.search_volume_group(name) {
                if vg.name != *lvm {
                    return Err(LayerError::PhysicalVolumeHasGroup {
                        device: name.clone(),
                        volume_group: vg.name,
                    });
                }
            }

            let groups = backend.get_volume_groups(lvm);
            match groups.len() {
                0 => {}
                1 => {
                    if groups[0].physical_volume == *name {
                        continue;
                    }
                    return Err(LayerError::VolumeGroupOnOtherVolume {
                        device: name.clone(),
                        volume_group: lvm.clone(),
                        physical_volume: groups[0].physical_volume.clone(),
                    });
                }
                _ => {
                    return Err(LayerError::VolumeGroupSpansVolumes {
                        device: name.clone(),
                        volume_group: lvm.clone(),
                    });
                }
            }

            let action = backend
                .create_volume_group(lvm, name)
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
            let groups = backend.get_volume_groups(lvm);
            match groups.len() {
                1 => {
                    if groups[0].physical_volume == *name {
                        continue;
                    }
                    return Err(LayerError::VolumeGroupValidation {
                        device: name.clone(),
                        expected: name.clone(),
                        actual: groups[0].physical_volume.clone(),
                    });
                }
                count => {
                    return Err(LayerError::VolumeGroupCountValidation {
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
