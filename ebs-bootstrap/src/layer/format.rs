// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::DeviceBackend;
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use crate::model::FileSystem;
use std::cell::RefCell;
use std::rc::Rc;

/// Formats unformatted devices to their requested filesystem. An existing
/// filesystem is never overwritten.
pub struct FormatDeviceLayer {
    device_backend: Rc<RefCell<dyn DeviceBackend>>,
}

impl FormatDeviceLayer {
    pub fn new(device_backend: Rc<RefCell<dyn DeviceBackend>>) -> Self {
        Self { device_backend }
    }
}

impl Layer for FormatDeviceLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        Ok(self.device_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let backend = self.device_backend.borrow();
        let mut actions = Vec::new();
        for (name, spec) in &config.devices {
            let requested = spec.fs.unwrap_or_default();
            if requested == FileSystem::Unformatted {
                return Err(LayerError::EraseRefused { device: name.clone() });
            }

            let device = backend.get_block_device(name)?;
            if device.file_system == requested {
                continue;
            }
            if device.file_system != FileSystem::Unformatted {
                return Err(LayerError::FormatRefused {
                    device: device.name.clone(),
                    file_system: device.file_system,
                });
            }

            let action = backend.format(&device, requested)?;
            actions.push(action.with_mode(config.mode(name)));
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let backend = self.device_backend.borrow();
        for (name, spec) in &config.devices {
            let expected = spec.fs.unwrap_or_default();
            let device = backend.get_block_device(name)?;
            if device.file_system != expected {
                return Err(LayerError::FileSystemMismatch {
                    device: name.clone(),
                    expected,
                    actual: device.file_system,
                });
            }
        }
        Ok(())
    }

    fn warning(&self) -> Option<&'static str> {
        Some("Formatting larger disks can take several seconds ⌛")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::action::ActionKind;
    use crate::backend::{BackendError, MockDeviceBackend};
    use crate::model::{BlockDevice, Mode};

    fn device(name: &str, file_system: FileSystem) -> BlockDevice {
        BlockDevice {
            name: name.to_string(),
            mount_point: None,
            file_system,
            label: None,
        }
    }

    fn layer_with(backend: MockDeviceBackend) -> FormatDeviceLayer {
        FormatDeviceLayer::new(Rc::new(RefCell::new(backend)))
    }

    fn config() -> Config {
        Config::parse(
            "devices:\n  /dev/xvdf:\n    fs: ext4\n    mode: force\n",
        )
        .unwrap()
    }

    #[test]
    fn test_unformatted_device_is_formatted() {
        let mut backend = MockDeviceBackend::new();
        backend
            .expect_get_block_device()
            .returning(|name| Ok(device(name, FileSystem::Unformatted)));
        backend.expect_format().returning(|device, fs| {
            Ok(Action::new(ActionKind::FormatDevice {
                device: device.name.clone(),
                file_system: fs,
            }))
        });

        let actions = layer_with(backend).plan(&config()).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].mode(), Mode::Force);
        assert_eq!(
            actions[0].kind(),
            &ActionKind::FormatDevice {
                device: "/dev/xvdf".to_string(),
                file_system: FileSystem::Ext4,
            }
        );
    }

    #[test]
    fn test_matching_file_system_is_skipped() {
        let mut backend = MockDeviceBackend::new();
        backend
            .expect_get_block_device()
            .returning(|name| Ok(device(name, FileSystem::Ext4)));

        let actions = layer_with(backend).plan(&config()).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_reformat_is_refused() {
        let mut backend = MockDeviceBackend::new();
        backend
            .expect_get_block_device()
            .returning(|name| Ok(device(name, FileSystem::Xfs)));

        let err = layer_with(backend).plan(&config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/dev/xvdf: Can not format a device with an existing xfs file \
             system"
        );
    }

    #[test]
    fn test_validate_compares_file_systems() {
        let mut backend = MockDeviceBackend::new();
        backend
            .expect_get_block_device()
            .returning(|name| Ok(device(name, FileSystem::Unformatted)));

        let err = layer_with(backend).validate(&config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/dev/xvdf: Failed file system validation checks. Expected=ext4, \
             Actual=unformatted"
        );
    }

    #[test]
    fn test_unknown_device_propagates() {
        let mut backend = MockDeviceBackend::new();
        backend.expect_get_block_device().returning(|name| {
            Err(BackendError::BlockDeviceNotFound {
                device: name.to_string(),
            })
        });

        let err = layer_with(backend).plan(&config()).unwrap_err();
        assert_eq!(err.to_string(), "/dev/xvdf: Could not find block device");
    }
}
