// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::FileBackend;
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use std::cell::RefCell;
use std::rc::Rc;

/// Creates missing mount-point directories.
pub struct CreateDirectoryLayer {
    file_backend: Rc<RefCell<dyn FileBackend>>,
}

impl CreateDirectoryLayer {
    pub fn new(file_backend: Rc<RefCell<dyn FileBackend>>) -> Self {
        Self { file_backend }
    }
}

impl Layer for CreateDirectoryLayer {
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
            match backend.get_directory(mount_point) {
                Ok(_) => continue,
                // Missing is this layer's job to fix; anything present but
                // not a directory cannot be mounted over.
                Err(err) if err.is_not_found() => {}
                Err(_) => {
                    return Err(LayerError::MountPointNotDirectory {
                        device: name.clone(),
                        path: mount_point.clone(),
                    });
                }
            }
            let action = backend.create_directory(mount_point);
            actions.push(action.with_mode(config.mode(name)));
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let backend = self.file_backend.borrow();
        for (name, spec) in &config.devices {
            let Some(mount_point) = &spec.mount_point else {
                continue;
            };
            if backend.get_directory(mount_point).is_err() {
                return Err(LayerError::DirectoryValidation {
                    device: name.clone(),
                    path: mount_point.clone(),
                });
            }
        }
        Ok(())
    }

    fn warning(&self) -> Option<&'static str> {
        None
    }

    fn should_process(&self, config: &Config) -> bool {
        config.devices.values().any(|spec| spec.mount_point.is_some())
    }
}
