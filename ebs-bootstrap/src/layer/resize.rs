// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::{DeviceBackend, DeviceMetricsBackend};
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use std::cell::RefCell;
use std::rc::Rc;

/// Grows filesystems whose device has outgrown them, per the configured
/// resize threshold.
pub struct ResizeDeviceLayer {
    device_backend: Rc<RefCell<dyn DeviceBackend>>,
    device_metrics_backend: Rc<RefCell<dyn DeviceMetricsBackend>>,
}

impl ResizeDeviceLayer {
    pub fn new(
        device_backend: Rc<RefCell<dyn DeviceBackend>>,
        device_metrics_backend: Rc<RefCell<dyn DeviceMetricsBackend>>,
    ) -> Self {
        Self { device_backend, device_metrics_backend }
    }
}

impl Layer for ResizeDeviceLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        self.device_backend.borrow_mut().refresh(config)?;
        Ok(self.device_metrics_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let device_backend = self.device_backend.borrow();
        let metrics_backend = self.device_metrics_backend.borrow();
        let mut actions = Vec::new();
        for name in config.devices.keys() {
            if !config.resize_fs(name) {
                continue;
            }
            let device = device_backend.get_block_device(name)?;
            let metrics = metrics_backend.get_block_device_metrics(name)?;
            if !metrics_backend
                .should_resize(&metrics, config.resize_threshold(name))
            {
                continue;
            }
            let action = device_backend.resize(&device)?;
            actions.push(action.with_mode(config.mode(name)));
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let metrics_backend = self.device_metrics_backend.borrow();
        for name in config.devices.keys() {
            if !config.resize_fs(name) {
                continue;
            }
            let metrics = metrics_backend.get_block_device_metrics(name)?;
            if metrics_backend
                .should_resize(&metrics, config.resize_threshold(name))
            {
                return Err(LayerError::ResizeValidation {
                    device: name.clone(),
                    file_system_size: metrics.file_system_size,
                    block_device_size: metrics.block_device_size,
                });
            }
        }
        Ok(())
    }

    fn warning(&self) -> Option<&'static str> {
        None
    }

    fn should_process(&self, config: &Config) -> bool {
        config.devices.keys().any(|name| config.resize_fs(name))
    }
}
