// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::DeviceBackend;
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use std::cell::RefCell;
use std::rc::Rc;

/// Applies the requested filesystem label. The backend decides whether an
/// unmount has to come first.
pub struct LabelDeviceLayer {
    device_backend: Rc<RefCell<dyn DeviceBackend>>,
}

impl LabelDeviceLayer {
    pub fn new(device_backend: Rc<RefCell<dyn DeviceBackend>>) -> Self {
        Self { device_backend }
    }
}

impl Layer for LabelDeviceLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        Ok(self.device_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let backend = self.device_backend.borrow();
        let mut actions = Vec::new();
        for (name, spec) in &config.devices {
            let Some(label) = &spec.label else {
                continue;
            };
            let device = backend.get_block_device(name)?;
            if device.label.as_deref() == Some(label.as_str()) {
                continue;
            }
            let mode = config.mode(name);
            for action in backend.label(&device, label)? {
                actions.push(action.with_mode(mode));
            }
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let backend = self.device_backend.borrow();
        for (name, spec) in &config.devices {
            let Some(label) = &spec.label else {
                continue;
            };
            let device = backend.get_block_device(name)?;
            if device.label.as_deref() != Some(label.as_str()) {
                return Err(LayerError::LabelMismatch {
                    device: name.clone(),
                    expected: label.clone(),
                    actual: device.label.unwrap_or_default(),
                });
            }
        }
        Ok(())
    }

    fn warning(&self) -> Option<&'static str> {
        Some(
            "Certain file systems require that devices be unmounted prior \
             to labeling",
        )
    }

    fn should_process(&self, config: &Config) -> bool {
        config.devices.values().any(|spec| spec.label.is_some())
    }
}
