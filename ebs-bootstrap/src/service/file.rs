// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::model::{File, FilePermissions, FileType};
use crate::service::ServiceError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};

const DEFAULT_DIRECTORY_PERMISSIONS: u32 = 0o755;

/// Filesystem metadata and mutation.
#[cfg_attr(test, mockall::automock)]
pub trait FileService {
    /// Stats a path. Symbolic links are resolved first, so the returned
    /// `path` reflects the target; a device mounted over a symlinked
    /// directory is reported by the probe under the resolved location, and
    /// keeping both views consistent lets them be compared directly.
    fn get_file(&self, path: &Utf8Path) -> Result<File, ServiceError>;

    /// `mkdir -p` with 0755 directories.
    fn create_directory(&self, path: &Utf8Path) -> Result<(), ServiceError>;

    fn change_owner(
        &self,
        path: &Utf8Path,
        uid: u32,
        gid: u32,
    ) -> Result<(), ServiceError>;

    fn change_permissions(
        &self,
        path: &Utf8Path,
        permissions: FilePermissions,
    ) -> Result<(), ServiceError>;
}

pub struct UnixFileService {}

impl UnixFileService {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for UnixFileService {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(path: &Utf8Path, source: io::Error) -> ServiceError {
    ServiceError::Io { path: path.to_path_buf(), source }
}

impl FileService for UnixFileService {
    fn get_file(&self, path: &Utf8Path) -> Result<File, ServiceError> {
        let metadata =
            fs::metadata(path).map_err(|source| io_error(path, source))?;

        let file_type = if metadata.is_file() {
            FileType::Regular
        } else if metadata.is_dir() {
            FileType::Directory
        } else {
            FileType::Special
        };

        let resolved = fs::canonicalize(path)
            .map_err(|source| io_error(path, source))?;
        let resolved = Utf8PathBuf::from_path_buf(resolved).map_err(|_| {
            io_error(
                path,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "path is not valid UTF-8",
                ),
            )
        })?;

        Ok(File {
            path: resolved,
            file_type,
            device_id: metadata.dev(),
            inode_no: metadata.ino(),
            user_id: metadata.uid(),
            group_id: metadata.gid(),
            permissions: FilePermissions::new(metadata.mode()),
        })
    }

    fn create_directory(&self, path: &Utf8Path) -> Result<(), ServiceError> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(DEFAULT_DIRECTORY_PERMISSIONS)
            .create(path)
            .map_err(|source| io_error(path, source))
    }

    fn change_owner(
        &self,
        path: &Utf8Path,
        uid: u32,
        gid: u32,
    ) -> Result<(), ServiceError> {
        std::os::unix::fs::chown(path, Some(uid), Some(gid))
            .map_err(|source| io_error(path, source))
    }

    fn change_permissions(
        &self,
        path: &Utf8Path,
        permissions: FilePermissions,
    ) -> Result<(), ServiceError> {
        fs::set_permissions(path, fs::Permissions::from_mode(permissions.mode()))
            .map_err(|source| io_error(path, source))
    }
}
