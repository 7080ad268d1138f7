// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::FileBackend;
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use std::cell::RefCell;
use std::rc::Rc;

/// Sets permission bits on each mount point.
pub struct ChangePermissionsLayer {
    file_backend: Rc<RefCell<dyn FileBackend>>,
}

impl ChangePermissionsLayer {
    pub fn new(file_backend: Rc<RefCell<dyn FileBackend>>) -> Self {
        Self { file_backend }
    }
}

impl Layer for ChangePermissionsLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        Ok(self.file_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let backend = self.file_backend.borrow();
        let mut actions = Vec::new();
        for (name, spec) in &config.devices {
            let Some(mount_point) = &spec.mount_point else {
                continue;
            };
            let Some(permissions) = spec.permissions else {
                continue;
            };

            let directory =
                backend.get_directory(mount_point).map_err(|_| {
                    LayerError::NotADirectory { path: mount_point.clone() }
                })?;
            if directory.permissions == permissions {
                continue;
            }

            let action = backend
                .change_permissions(mount_point, permissions)
                .with_mode(config.mode(name));
            actions.push(action);
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let backend = self.file_backend.borrow();
        for (name, spec) in &config.devices {
            let Some(mount_point) = &spec.mount_point else {
                continue;
            };
            let Some(permissions) = spec.permissions else {
                continue;
            };

            let directory =
                backend.get_directory(mount_point).map_err(|_| {
                    LayerError::OwnershipDirectoryValidation {
                        device: name.clone(),
                        path: mount_point.clone(),
                    }
                })?;
            if directory.permissions != permissions {
                return Err(LayerError::PermissionsMismatch {
                    device: name.clone(),
                    path: mount_point.clone(),
                    expected: permissions,
                    actual: directory.permissions,
                });
            }
        }
        Ok(())
    }

    fn warning(&self) -> Option<&'static str> {
        None
    }

    fn should_process(&self, config: &Config) -> bool {
        config.devices.values().any(|spec| {
            spec.mount_point.is_some() && spec.permissions.is_some()
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::action::ActionKind;
    use crate::backend::MockFileBackend;
    use crate::model::{File, FilePermissions, FileType};
    use camino::Utf8PathBuf;

    fn file_backend(permissions: u32) -> MockFileBackend {
        let mut backend = MockFileBackend::new();
        backend.expect_get_directory().returning(move |path| {
            Ok(File {
                path: path.to_path_buf(),
                file_type: FileType::Directory,
                device_id: 259,
                inode_no: 2,
                user_id: 0,
                group_id: 0,
                permissions: FilePermissions::new(permissions),
            })
        });
        backend.expect_change_permissions().returning(|path, permissions| {
            Action::new(ActionKind::ChangePermissions {
                path: path.to_path_buf(),
                permissions,
            })
        });
        backend
    }

    fn layer(permissions: u32) -> ChangePermissionsLayer {
        ChangePermissionsLayer::new(Rc::new(RefCell::new(file_backend(
            permissions,
        ))))
    }

    fn config() -> Config {
        Config::parse(
            "devices:\n  /dev/xvdf:\n    fs: ext4\n    mountPoint: /mnt/app\n    permissions: 755\n",
        )
        .unwrap()
    }

    #[test]
    fn test_divergent_permissions_are_changed() {
        let actions = layer(0o700).plan(&config()).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0].kind(),
            &ActionKind::ChangePermissions {
                path: Utf8PathBuf::from("/mnt/app"),
                permissions: FilePermissions::new(0o755),
            }
        );
    }

    #[test]
    fn test_matching_permissions_are_skipped() {
        assert!(layer(0o755).plan(&config()).unwrap().is_empty());
        assert!(layer(0o755).validate(&config()).is_ok());
    }

    #[test]
    fn test_validate_reports_mismatch() {
        let err = layer(0o700).validate(&config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/dev/xvdf: Failed permissions validation checks. /mnt/app \
             Permissions Expected=0o755, Actual=0o700"
        );
    }
}
