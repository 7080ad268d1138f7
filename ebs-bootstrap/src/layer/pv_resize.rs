// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::LvmBackend;
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use std::cell::RefCell;
use std::rc::Rc;

/// Grows physical volumes whose backing device has been enlarged.
pub struct ResizePhysicalVolumeLayer {
    lvm_backend: Rc<RefCell<dyn LvmBackend>>,
}

impl ResizePhysicalVolumeLayer {
    pub fn new(lvm_backend: Rc<RefCell<dyn LvmBackend>>) -> Self {
        Self { lvm_backend }
    }
}

impl Layer for ResizePhysicalVolumeLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        Ok(self.lvm_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let backend = self.lvm_backend.borrow();
        let mut actions = Vec::new();
        for (name, spec) in &config.devices {
            if spec.lvm.is_none() || !config.resize_fs(name) {
                continue;
            }
            if !backend.should_resize_physical_volume(name)? {
                continue;
            }
            let action = backend
                .resize_physical_volume(name)
                .with_mode(config.mode(name));
            actions.push(action);
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let backend = self.lvm_backend.borrow();
        for (name, spec) in &config.devices {
            if spec.lvm.is_none() || !config.resize_fs(name) {
                continue;
            }
            if backend.should_resize_physical_volume(name)? {
                return Err(LayerError::PhysicalVolumeResizeValidation {
                    device: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn warning(&self) -> Option<&'static str> {
        None
    }

    fn should_process(&self, config: &Config) -> bool {
        config.devices.iter().any(|(name, spec)| {
            spec.lvm.is_some() && config.resize_fs(name)
        })
    }
}
