// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::backend::BackendError;
use crate::config::Config;
use crate::model::{Group, User};
use crate::service::OwnerService;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cache of the users and groups named by the document, keyed by the exact
/// string the operator wrote (name or numeric id).
#[cfg_attr(test, mockall::automock)]
pub trait OwnerBackend {
    fn get_user(&self, user: &str) -> Result<User, BackendError>;

    fn get_group(&self, group: &str) -> Result<Group, BackendError>;

    fn refresh(&mut self, config: &Config) -> Result<(), BackendError>;
}

pub struct LinuxOwnerBackend {
    users: BTreeMap<String, User>,
    groups: BTreeMap<String, Group>,
    owner_service: Arc<dyn OwnerService>,
}

impl LinuxOwnerBackend {
    pub fn new(owner_service: Arc<dyn OwnerService>) -> Self {
        Self {
            users: BTreeMap::new(),
            groups: BTreeMap::new(),
            owner_service,
        }
    }
}

impl OwnerBackend for LinuxOwnerBackend {
    fn get_user(&self, user: &str) -> Result<User, BackendError> {
        self.users
            .get(user)
            .cloned()
            .ok_or_else(|| BackendError::UserNotFound(user.to_string()))
    }

    fn get_group(&self, group: &str) -> Result<Group, BackendError> {
        self.groups
            .get(group)
            .cloned()
            .ok_or_else(|| BackendError::GroupNotFound(group.to_string()))
    }

    fn refresh(&mut self, config: &Config) -> Result<(), BackendError> {
        self.users = BTreeMap::new();
        self.groups = BTreeMap::new();

        let mut users = BTreeMap::new();
        let mut groups = BTreeMap::new();
        for spec in config.devices.values() {
            if let Some(user) = &spec.user {
                let resolved = self.owner_service.get_user(user)?;
                users.insert(user.clone(), resolved);
            }
            if let Some(group) = &spec.group {
                let resolved = self.owner_service.get_group(group)?;
                groups.insert(group.clone(), resolved);
            }
        }
        self.users = users;
        self.groups = groups;
        Ok(())
    }
}
