// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::model::{Group, User};
use crate::service::ServiceError;
use uzers::{
    get_current_gid, get_current_uid, get_group_by_gid, get_group_by_name,
    get_user_by_name, get_user_by_uid,
};

/// User and group resolution by name or numeric id.
#[cfg_attr(test, mockall::automock)]
pub trait OwnerService {
    fn get_current_user(&self) -> Result<User, ServiceError>;

    fn get_current_group(&self) -> Result<Group, ServiceError>;

    /// `user` may be a name or a decimal uid.
    fn get_user(&self, user: &str) -> Result<User, ServiceError>;

    /// `group` may be a name or a decimal gid.
    fn get_group(&self, group: &str) -> Result<Group, ServiceError>;
}

pub struct UnixOwnerService {}

impl UnixOwnerService {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for UnixOwnerService {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerService for UnixOwnerService {
    fn get_current_user(&self) -> Result<User, ServiceError> {
        let uid = get_current_uid();
        let user = get_user_by_uid(uid).ok_or(ServiceError::CurrentUser)?;
        Ok(User { name: user.name().to_string_lossy().to_string(), id: uid })
    }

    fn get_current_group(&self) -> Result<Group, ServiceError> {
        let gid = get_current_gid();
        let group = get_group_by_gid(gid).ok_or(ServiceError::CurrentUser)?;
        Ok(Group { name: group.name().to_string_lossy().to_string(), id: gid })
    }

    fn get_user(&self, user: &str) -> Result<User, ServiceError> {
        match user.parse::<u32>() {
            Ok(uid) => {
                let resolved = get_user_by_uid(uid)
                    .ok_or(ServiceError::UserIdNotFound(uid))?;
                Ok(User {
                    name: resolved.name().to_string_lossy().to_string(),
                    id: uid,
                })
            }
            Err(_) => {
                let resolved = get_user_by_name(user).ok_or_else(|| {
                    ServiceError::UserNameNotFound(user.to_string())
                })?;
                Ok(User { name: user.to_string(), id: resolved.uid() })
            }
        }
    }

    fn get_group(&self, group: &str) -> Result<Group, ServiceError> {
        match group.parse::<u32>() {
            Ok(gid) => {
                let resolved = get_group_by_gid(gid)
                    .ok_or(ServiceError::GroupIdNotFound(gid))?;
                Ok(Group {
                    name: resolved.name().to_string_lossy().to_string(),
                    id: gid,
                })
            }
            Err(_) => {
                let resolved = get_group_by_name(group).ok_or_else(|| {
                    ServiceError::GroupNameNotFound(group.to_string())
                })?;
                Ok(Group { name: group.to_string(), id: resolved.gid() })
            }
        }
    }
}
