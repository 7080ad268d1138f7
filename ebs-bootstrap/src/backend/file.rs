// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::{Action, ActionKind};
use crate::backend::BackendError;
use crate::config::Config;
use crate::model::{File, FilePermissions, FileType};
use crate::service::FileService;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cache of the configured mount-point directories (and their parents, so
/// the mount-point predicate can be answered without further stats).
#[cfg_attr(test, mockall::automock)]
pub trait FileBackend {
    fn create_directory(&self, path: &Utf8Path) -> Action;

    fn change_owner(&self, path: &Utf8Path, uid: u32, gid: u32) -> Action;

    fn change_permissions(
        &self,
        path: &Utf8Path,
        permissions: FilePermissions,
    ) -> Action;

    fn get_directory(&self, path: &Utf8Path) -> Result<File, BackendError>;

    /// Whether `path` is the root of a mounted filesystem.
    fn is_mount(&self, path: &Utf8Path) -> bool;

    fn refresh(&mut self, config: &Config) -> Result<(), BackendError>;
}

pub struct LinuxFileBackend {
    files: BTreeMap<Utf8PathBuf, File>,
    file_service: Arc<dyn FileService>,
}

impl LinuxFileBackend {
    pub fn new(file_service: Arc<dyn FileService>) -> Self {
        Self { files: BTreeMap::new(), file_service }
    }
}

impl FileBackend for LinuxFileBackend {
    fn create_directory(&self, path: &Utf8Path) -> Action {
        Action::new(ActionKind::CreateDirectory { path: path.to_path_buf() })
    }

    fn change_owner(&self, path: &Utf8Path, uid: u32, gid: u32) -> Action {
        Action::new(ActionKind::ChangeOwner {
            path: path.to_path_buf(),
            uid,
            gid,
        })
    }

    fn change_permissions(
        &self,
        path: &Utf8Path,
        permissions: FilePermissions,
    ) -> Action {
        Action::new(ActionKind::ChangePermissions {
            path: path.to_path_buf(),
            permissions,
        })
    }

    fn get_directory(&self, path: &Utf8Path) -> Result<File, BackendError> {
        let file = self.files.get(path).ok_or_else(|| {
            BackendError::DirectoryNotFound { path: path.to_path_buf() }
        })?;
        if file.file_type != FileType::Directory {
            return Err(BackendError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        Ok(file.clone())
    }

    // Ported from the mount-point predicate of os.path.ismount(): a
    // directory is a mount point when its device id differs from its
    // parent's, or when it shares an inode with its parent (the root of a
    // filesystem). Symlinks were resolved at stat time, so there is no
    // separate link check here.
    fn is_mount(&self, path: &Utf8Path) -> bool {
        let Some(child) = self.files.get(path) else {
            return false;
        };
        if child.file_type != FileType::Directory {
            return false;
        }
        let Some(parent_path) = path.parent() else {
            return false;
        };
        let Some(parent) = self.files.get(parent_path) else {
            return false;
        };
        if child.device_id != parent.device_id {
            return true;
        }
        child.inode_no == parent.inode_no
    }

    fn refresh(&mut self, config: &Config) -> Result<(), BackendError> {
        self.files = BTreeMap::new();

        let mut files = BTreeMap::new();
        for spec in config.devices.values() {
            let Some(mount_point) = &spec.mount_point else {
                continue;
            };
            // The mount-point predicate needs the parent directory too, so
            // both are prefetched.
            let mut paths = vec![mount_point.clone()];
            if let Some(parent) = mount_point.parent() {
                paths.push(parent.to_path_buf());
            }
            for path in paths {
                if files.contains_key(&path) {
                    continue;
                }
                match self.file_service.get_file(&path) {
                    Ok(file) => {
                        files.insert(path, file);
                    }
                    Err(err) if err.is_not_found() => continue,
                    Err(err) => return Err(err.into()),
                }
            }
        }
        self.files = files;
        Ok(())
    }
}
