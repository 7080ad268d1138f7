// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::{FileBackend, OwnerBackend};
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use crate::model::File;
use std::cell::RefCell;
use std::rc::Rc;

/// Sets ownership of each mount point. A side of the ownership pair the
/// operator left unspecified is preserved as-is.
pub struct ChangeOwnerLayer {
    owner_backend: Rc<RefCell<dyn OwnerBackend>>,
    file_backend: Rc<RefCell<dyn FileBackend>>,
}

impl ChangeOwnerLayer {
    pub fn new(
        owner_backend: Rc<RefCell<dyn OwnerBackend>>,
        file_backend: Rc<RefCell<dyn FileBackend>>,
    ) -> Self {
        Self { owner_backend, file_backend }
    }

    /// The (uid, gid) the directory should end up with: the resolved
    /// desired owner where specified, the current owner elsewhere.
    fn desired_ownership(
        &self,
        spec_user: &Option<String>,
        spec_group: &Option<String>,
        directory: &File,
    ) -> Result<(u32, u32), LayerError> {
        let backend = self.owner_backend.borrow();
        let mut uid = directory.user_id;
        let mut gid = directory.group_id;
        if let Some(user) = spec_user {
            uid = backend.get_user(user)?.id;
        }
        if let Some(group) = spec_group {
            gid = backend.get_group(group)?.id;
        }
        Ok((uid, gid))
    }
}

impl Layer for ChangeOwnerLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        self.owner_backend.borrow_mut().refresh(config)?;
        Ok(self.file_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let file_backend = self.file_backend.borrow();
        let mut actions = Vec::new();
        for (name, spec) in &config.devices {
            let Some(mount_point) = &spec.mount_point else {
                continue;
            };
            if spec.user.is_none() && spec.group.is_none() {
                continue;
            }

            let directory =
                file_backend.get_directory(mount_point).map_err(|_| {
                    LayerError::NotADirectory { path: mount_point.clone() }
                })?;
            let (uid, gid) =
                self.desired_ownership(&spec.user, &spec.group, &directory)?;
            if directory.user_id == uid && directory.group_id == gid {
                continue;
            }

            let action = file_backend
                .change_owner(mount_point, uid, gid)
                .with_mode(config.mode(name));
            actions.push(action);
        }
        Ok(actions)
    }

    fn validate(&self, config: &Config) -> Result<(), LayerError> {
        let file_backend = self.file_backend.borrow();
        for (name, spec) in &config.devices {
            let Some(mount_point) = &spec.mount_point else {
                continue;
            };
            if spec.user.is_none() && spec.group.is_none() {
                continue;
            }

            let directory =
                file_backend.get_directory(mount_point).map_err(|_| {
                    LayerError::OwnershipDirectoryValidation {
                        device: name.clone(),
                        path: mount_point.clone(),
                    }
                })?;
            let (uid, gid) =
                self.desired_ownership(&spec.user, &spec.group, &directory)?;
            if directory.user_id != uid {
                return Err(LayerError::UserMismatch {
                    device: name.clone(),
                    path: mount_point.clone(),
                    expected: uid,
                    actual: directory.user_id,
                });
            }
            if directory.group_id != gid {
                return Err(LayerError::GroupMismatch {
                    device: name.clone(),
                    path: mount_point.clone(),
                    expected: gid,
                    actual: directory.group_id,
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
            spec.mount_point.is_some()
                && (spec.user.is_some() || spec.group.is_some())
        })
    }
}
