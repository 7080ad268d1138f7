// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::{DeviceBackend, FileBackend};
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use crate::model::FileSystem;
use std::cell::RefCell;
use std::rc::Rc;

/// Mounts each device at its configured mount point, relocating devices
/// mounted elsewhere and refusing to stack a device over another device's
/// mount.
pub struct MountDeviceLayer {
    device_backend: Rc<RefCell<dyn DeviceBackend>>,
    file_backend: Rc<RefCell<dyn FileBackend>>,
}

impl MountDeviceLayer {
    pub fn new(
        device_backend: Rc<RefCell<dyn DeviceBackend>>,
        file_backend: Rc<RefCell<dyn FileBackend>>,
    ) -> Self {
        Self { device_backend, file_backend }
    }
}

impl Layer for MountDeviceLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        self.device_backend.borrow_mut().refresh(config)?;
        Ok(self.file_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let device_backend = self.device_backend.borrow();
        let file_backend = self.file_backend.borrow();
        let mut actions = Vec::new();
        for (name, spec) in &config.devices {
            let Some(mount_point) = &spec.mount_point else {
                continue;
            };

            let device = device_backend.get_block_device(name)?;
            if device.file_system == FileSystem::Unformatted {
                return Err(LayerError::MountUnformatted {
                    device: device.name.clone(),
                });
            }

            let directory =
                file_backend.get_directory(mount_point).map_err(|_| {
                    LayerError::MountTargetMissing {
                        device: name.clone(),
                        path: mount_point.clone(),
                    }
                })?;

            let mode = config.mode(name);
            let options = config.mount_options(name);
            if device.mount_point.as_deref() == Some(directory.path.as_path())
            {
                if config.remount(name) {
                    let action = device_backend
                        .remount(&device, mount_point, &options)
                        .with_mode(mode);
                    actions.push(action);
                }
            } else {
                if file_backend.is_mount(mount_point) {
                    return Err(LayerError::MountPointTaken {
                        device: name.clone(),
                        path: mount_point.clone(),
                    });
                }
                // A device mounted somewhere else is moved, not stacked.
                if device.mount_point.is_some() {
                    actions.push(
                        device_backend.umount(&device).with_mode(mode),
                    );
                }
                actions.push(
                    device_backend
                        .mount(&device, mount_point, &options)
                        .with_mode(mode),
                );
            }
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let device_backend = self.device_backend.borrow();
        let file_backend = self.file_backend.borrow();
        for (name, spec) in &config.devices {
            let Some(mount_point) = &spec.mount_point else {
                continue;
            };
            let device = device_backend.get_block_device(name)?;
            let directory =
                file_backend.get_directory(mount_point).map_err(|_| {
                    LayerError::DirectoryValidation {
                        device: name.clone(),
                        path: mount_point.clone(),
                    }
                })?;
            if device.mount_point.as_deref() != Some(directory.path.as_path())
            {
                return Err(LayerError::MountValidation {
                    device: name.clone(),
                    path: mount_point.clone(),
                });
            }
        }
        Ok(())
    }

    fn warning(&self) -> Option<&'static str> {
        Some(
            "Devices mounted to a location, not specified in the \
             configuration, will be unmounted",
        )
    }

    fn should_process(&self, config: &Config) -> bool {
        config.devices.values().any(|spec| spec.mount_point.is_some())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::action::ActionKind;
    use crate::backend::{BackendError, MockDeviceBackend, MockFileBackend};
    use crate::model::{
        BlockDevice, File, FilePermissions, FileType, MountOptions,
    };
    use camino::{Utf8Path, Utf8PathBuf};

    fn device(mount_point: Option<&str>) -> BlockDevice {
        BlockDevice {
            name: "/dev/xvdf".to_string(),
            mount_point: mount_point.map(Utf8PathBuf::from),
            file_system: FileSystem::Ext4,
            label: None,
        }
    }

    fn directory(path: &str) -> File {
        File {
            path: Utf8PathBuf::from(path),
            file_type: FileType::Directory,
            device_id: 259,
            inode_no: 2,
            user_id: 0,
            group_id: 0,
            permissions: FilePermissions::new(0o755),
        }
    }

    fn device_backend(mount_point: Option<&'static str>) -> MockDeviceBackend {
        let mut backend = MockDeviceBackend::new();
        backend
            .expect_get_block_device()
            .returning(move |_| Ok(device(mount_point)));
        backend.expect_mount().returning(|device, target, options| {
            Action::new(ActionKind::MountDevice {
                source: device.name.clone(),
                target: target.to_path_buf(),
                file_system: device.file_system,
                options: options.clone(),
            })
        });
        backend.expect_remount().returning(|device, target, options| {
            Action::new(ActionKind::MountDevice {
                source: device.name.clone(),
                target: target.to_path_buf(),
                file_system: device.file_system,
                options: options.remount(),
            })
        });
        backend.expect_umount().returning(|device| {
            Action::new(ActionKind::UnmountDevice {
                source: device.name.clone(),
                target: device.mount_point.clone().unwrap_or_default(),
            })
        });
        backend
    }

    fn file_backend(
        exists: bool,
        is_mount: bool,
    ) -> MockFileBackend {
        let mut backend = MockFileBackend::new();
        backend.expect_get_directory().returning(move |path| {
            if exists {
                Ok(directory(path.as_str()))
            } else {
                Err(BackendError::DirectoryNotFound {
                    path: path.to_path_buf(),
                })
            }
        });
        backend.expect_is_mount().returning(move |_| is_mount);
        backend
    }

    fn layer(
        device_backend: MockDeviceBackend,
        file_backend: MockFileBackend,
    ) -> MountDeviceLayer {
        MountDeviceLayer::new(
            Rc::new(RefCell::new(device_backend)),
            Rc::new(RefCell::new(file_backend)),
        )
    }

    fn config() -> Config {
        Config::parse(
            "devices:\n  /dev/xvdf:\n    fs: ext4\n    mountPoint: /mnt/app\n",
        )
        .unwrap()
    }

    #[test]
    fn test_unmounted_device_is_mounted() {
        let layer = layer(device_backend(None), file_backend(true, false));
        let actions = layer.plan(&config()).unwrap();
        assert_eq!(actions.len(), 1);
        let ActionKind::MountDevice { source, target, options, .. } =
            actions[0].kind()
        else {
            panic!("expected a mount action");
        };
        assert_eq!(source, "/dev/xvdf");
        assert_eq!(target, Utf8Path::new("/mnt/app"));
        assert_eq!(options, &MountOptions::from("defaults"));
    }

    #[test]
    fn test_device_mounted_elsewhere_is_moved() {
        let layer = layer(
            device_backend(Some("/mnt/other")),
            file_backend(true, false),
        );
        let actions = layer.plan(&config()).unwrap();
        assert_eq!(actions.len(), 2);
        assert!(matches!(
            actions[0].kind(),
            ActionKind::UnmountDevice { .. }
        ));
        assert!(matches!(actions[1].kind(), ActionKind::MountDevice { .. }));
    }

    #[test]
    fn test_already_mounted_at_target_is_skipped() {
        let layer = layer(
            device_backend(Some("/mnt/app")),
            file_backend(true, false),
        );
        assert!(layer.plan(&config()).unwrap().is_empty());
        assert!(layer.validate(&config()).is_ok());
    }

    #[test]
    fn test_remount_requested() {
        let layer = layer(
            device_backend(Some("/mnt/app")),
            file_backend(true, false),
        );
        let mut config = config();
        config.set_overrides(crate::config::Options {
            remount: Some(true),
            ..Default::default()
        });
        let actions = layer.plan(&config).unwrap();
        assert_eq!(actions.len(), 1);
        let ActionKind::MountDevice { options, .. } = actions[0].kind() else {
            panic!("expected a mount action");
        };
        assert_eq!(options.as_str(), "defaults,remount");
    }

    #[test]
    fn test_target_owned_by_another_device_is_refused() {
        let layer = layer(device_backend(None), file_backend(true, true));
        let err = layer.plan(&config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/dev/xvdf: /mnt/app is already mounted by another device"
        );
    }

    #[test]
    fn test_unformatted_device_cannot_be_mounted() {
        let mut backend = MockDeviceBackend::new();
        backend.expect_get_block_device().returning(|_| {
            Ok(BlockDevice {
                name: "/dev/xvdf".to_string(),
                mount_point: None,
                file_system: FileSystem::Unformatted,
                label: None,
            })
        });
        let layer = layer(backend, file_backend(true, false));
        let err = layer.plan(&config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/dev/xvdf: Can not mount a device with no file system"
        );
    }

    #[test]
    fn test_missing_target_directory_is_refused() {
        let layer = layer(device_backend(None), file_backend(false, false));
        let err = layer.plan(&config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/dev/xvdf: /mnt/app must exist as a directory before it can be \
             mounted"
        );
    }

    #[test]
    fn test_validate_requires_mount_at_target() {
        let layer =
            layer(device_backend(None), file_backend(true, false));
        let err = layer.validate(&config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/dev/xvdf: Failed mountpoint validation checks. Device not \
             mounted to /mnt/app"
        );
    }
}
