// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::backend::BackendError;
use crate::config::Config;
use crate::model::BlockDeviceMetrics;
use crate::service::{DeviceService, FileSystemServiceFactory};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cache of block-device and filesystem byte sizes for the configured
/// devices.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceMetricsBackend {
    fn get_block_device_metrics(
        &self,
        device: &str,
    ) -> Result<BlockDeviceMetrics, BackendError>;

    /// Whether the filesystem-to-device ratio has fallen below the
    /// threshold percentage. A zero threshold requests a resize
    /// unconditionally.
    fn should_resize(
        &self,
        metrics: &BlockDeviceMetrics,
        threshold_pct: f64,
    ) -> bool;

    fn refresh(&mut self, config: &Config) -> Result<(), BackendError>;
}

pub struct LinuxDeviceMetricsBackend {
    metrics: BTreeMap<String, BlockDeviceMetrics>,
    device_service: Arc<dyn DeviceService>,
    file_system_service_factory: Arc<dyn FileSystemServiceFactory>,
}

impl LinuxDeviceMetricsBackend {
    pub fn new(
        device_service: Arc<dyn DeviceService>,
        file_system_service_factory: Arc<dyn FileSystemServiceFactory>,
    ) -> Self {
        Self {
            metrics: BTreeMap::new(),
            device_service,
            file_system_service_factory,
        }
    }
}

impl DeviceMetricsBackend for LinuxDeviceMetricsBackend {
    fn get_block_device_metrics(
        &self,
        device: &str,
    ) -> Result<BlockDeviceMetrics, BackendError> {
        self.metrics.get(device).copied().ok_or_else(|| {
            BackendError::MetricsNotFound { device: device.to_string() }
        })
    }

    fn should_resize(
        &self,
        metrics: &BlockDeviceMetrics,
        threshold_pct: f64,
    ) -> bool {
        metrics.should_resize(threshold_pct)
    }

    fn refresh(&mut self, config: &Config) -> Result<(), BackendError> {
        self.metrics = BTreeMap::new();

        let mut metrics = BTreeMap::new();
        for name in config.devices.keys() {
            let device = self.device_service.get_block_device(name)?;
            let file_system_service = self
                .file_system_service_factory
                .select(device.file_system)
                .map_err(|source| BackendError::FileSystem {
                    device: device.name.clone(),
                    source,
                })?;
            let block_device_size = self.device_service.get_size(&device.name)?;
            let file_system_size =
                file_system_service.get_size(&device.name)?;
            metrics.insert(
                device.name.clone(),
                BlockDeviceMetrics { file_system_size, block_device_size },
            );
        }
        self.metrics = metrics;
        Ok(())
    }
}
