// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::LvmBackend;
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use std::cell::RefCell;
use std::rc::Rc;

/// Extends logical volumes toward their configured percent-of-group
/// target. The resize policy lives in the backend: within tolerance is a
/// no-op and a downsize is refused outright.
pub struct ResizeLogicalVolumeLayer {
    lvm_backend: Rc<RefCell<dyn LvmBackend>>,
}

impl ResizeLogicalVolumeLayer {
    pub fn new(lvm_backend: Rc<RefCell<dyn LvmBackend>>) -> Self {
        Self { lvm_backend }
    }
}

impl Layer for ResizeLogicalVolumeLayer {
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
            if !config.resize_fs(name) {
                continue;
            }
            let consumption = config.lvm_consumption(name);
            if !backend.should_resize_logical_volume(lvm, lvm, consumption)? {
                continue;
            }
            let action = backend
                .resize_logical_volume(lvm, lvm, consumption)
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
            if !config.resize_fs(name) {
                continue;
            }
            if backend.should_resize_logical_volume(
                lvm,
                lvm,
                config.lvm_consumption(name),
            )? {
                return Err(LayerError::LogicalVolumeResizeValidation {
                    device: name.clone(),
                    logical_volume: lvm.clone(),
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
