// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deferred host mutations.
//!
//! An [`Action`] is pure data: constructing one never touches the host.
//! The closed [`ActionKind`] sum is dispatched in one place, the
//! [`ActionExecutor`], which also centralises the mode gating (force /
//! prompt / healthcheck) and owns the standard-input seam used by Prompt
//! mode.

use crate::model::{FilePermissions, FileSystem, Mode, MountOptions};
use crate::service::{
    DeviceService, FileService, FileSystemServiceFactory, LvmService,
    ServiceError,
};
use camino::Utf8PathBuf;
use std::io::{BufRead, Write};
use std::sync::Arc;

/// Every host mutation the engine can plan.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    FormatDevice {
        device: String,
        file_system: FileSystem,
    },
    LabelDevice {
        device: String,
        file_system: FileSystem,
        label: String,
    },
    MountDevice {
        source: String,
        target: Utf8PathBuf,
        file_system: FileSystem,
        options: MountOptions,
    },
    UnmountDevice {
        source: String,
        target: Utf8PathBuf,
    },
    CreateDirectory {
        path: Utf8PathBuf,
    },
    ChangeOwner {
        path: Utf8PathBuf,
        uid: u32,
        gid: u32,
    },
    ChangePermissions {
        path: Utf8PathBuf,
        permissions: FilePermissions,
    },
    ResizeFileSystem {
        device: String,
        target: String,
        file_system: FileSystem,
    },
    CreatePhysicalVolume {
        device: String,
    },
    ResizePhysicalVolume {
        name: String,
    },
    CreateVolumeGroup {
        name: String,
        physical_volume: String,
    },
    CreateLogicalVolume {
        name: String,
        volume_group: String,
        volume_group_percent: u64,
    },
    ActivateLogicalVolume {
        name: String,
        volume_group: String,
    },
    ResizeLogicalVolume {
        name: String,
        volume_group: String,
        volume_group_percent: u64,
    },
}

impl ActionKind {
    /// Affirmative question shown in Prompt mode.
    pub fn prompt(&self) -> String {
        match self {
            ActionKind::FormatDevice { device, file_system } => format!(
                "Would you like to format {device} to {file_system}"
            ),
            ActionKind::LabelDevice { device, label, .. } => format!(
                "Would you like to label device {device} to '{label}'"
            ),
            ActionKind::MountDevice { source, target, options, .. } => format!(
                "Would you like to mount {source} to {target} ({options})"
            ),
            ActionKind::UnmountDevice { source, target } => format!(
                "Would you like to unmount {source} from {target}"
            ),
            ActionKind::CreateDirectory { path } => format!(
                "Would you like to recursively create directory {path}"
            ),
            ActionKind::ChangeOwner { path, uid, gid } => format!(
                "Would you like to change ownership ({uid}:{gid}) of {path}"
            ),
            ActionKind::ChangePermissions { path, permissions } => format!(
                "Would you like to change permissions ({permissions}) of {path}"
            ),
            ActionKind::ResizeFileSystem { device, file_system, .. } => {
                format!(
                    "Would you like to resize the {file_system} file system \
                     of {device}"
                )
            }
            ActionKind::CreatePhysicalVolume { device } => format!(
                "Would you like to create physical volume {device}"
            ),
            ActionKind::ResizePhysicalVolume { name } => format!(
                "Would you like to resize physical volume {name}"
            ),
            ActionKind::CreateVolumeGroup { name, physical_volume } => {
                format!(
                    "Would you like to create volume group {name} on \
                     physical volume {physical_volume}"
                )
            }
            ActionKind::CreateLogicalVolume {
                name,
                volume_group,
                volume_group_percent,
            } => format!(
                "Would you like to create logical volume {name} that consumes \
                 {volume_group_percent}% of volume group {volume_group}"
            ),
            ActionKind::ActivateLogicalVolume { name, volume_group } => {
                format!(
                    "Would you like to activate logical volume \
                     {volume_group}/{name}"
                )
            }
            ActionKind::ResizeLogicalVolume {
                name,
                volume_group,
                volume_group_percent,
            } => format!(
                "Would you like to resize logical volume {volume_group}/{name} \
                 to {volume_group_percent}% of volume group {volume_group}"
            ),
        }
    }

    /// Declining statement used when the action is gated off.
    pub fn refuse(&self) -> String {
        match self {
            ActionKind::FormatDevice { device, file_system } => {
                format!("Refused to format {device} to {file_system}")
            }
            ActionKind::LabelDevice { device, label, .. } => {
                format!("Refused to label {device} to '{label}'")
            }
            ActionKind::MountDevice { source, target, options, .. } => {
                format!("Refused to mount {source} to {target} ({options})")
            }
            ActionKind::UnmountDevice { source, target } => {
                format!("Refused to unmount {source} from {target}")
            }
            ActionKind::CreateDirectory { path } => {
                format!("Refused to create directory {path}")
            }
            ActionKind::ChangeOwner { path, uid, gid } => {
                format!("Refused to change ownership ({uid}:{gid}) of {path}")
            }
            ActionKind::ChangePermissions { path, permissions } => format!(
                "Refused to change permissions ({permissions}) of {path}"
            ),
            ActionKind::ResizeFileSystem { device, file_system, .. } => {
                format!(
                    "Refused to resize the {file_system} file system of \
                     {device}"
                )
            }
            ActionKind::CreatePhysicalVolume { device } => {
                format!("Refused to create physical volume {device}")
            }
            ActionKind::ResizePhysicalVolume { name } => {
                format!("Refused to resize physical volume {name}")
            }
            ActionKind::CreateVolumeGroup { name, physical_volume } => {
                format!(
                    "Refused to create volume group {name} on physical \
                     volume {physical_volume}"
                )
            }
            ActionKind::CreateLogicalVolume { name, volume_group, .. } => {
                format!(
                    "Refused to create logical volume {name} in volume \
                     group {volume_group}"
                )
            }
            ActionKind::ActivateLogicalVolume { name, volume_group } => {
                format!(
                    "Refused to activate logical volume {volume_group}/{name}"
                )
            }
            ActionKind::ResizeLogicalVolume { name, volume_group, .. } => {
                format!(
                    "Refused to resize logical volume {volume_group}/{name}"
                )
            }
        }
    }

    /// Statement printed after the mutation succeeds.
    pub fn success(&self) -> String {
        match self {
            ActionKind::FormatDevice { device, file_system } => {
                format!("Successfully formatted {device} to {file_system}")
            }
            ActionKind::LabelDevice { device, label, .. } => {
                format!("Successfully labelled {device} to '{label}'")
            }
            ActionKind::MountDevice { source, target, options, .. } => format!(
                "Successfully mounted {source} to {target} ({options})"
            ),
            ActionKind::UnmountDevice { source, target } => {
                format!("Successfully unmounted {source} from {target}")
            }
            ActionKind::CreateDirectory { path } => {
                format!("Successfully created directory {path}")
            }
            ActionKind::ChangeOwner { path, uid, gid } => format!(
                "Successfully changed ownership ({uid}:{gid}) of {path}"
            ),
            ActionKind::ChangePermissions { path, permissions } => format!(
                "Successfully changed permissions ({permissions}) of {path}"
            ),
            ActionKind::ResizeFileSystem { device, file_system, .. } => {
                format!(
                    "Successfully resized the {file_system} file system of \
                     {device}"
                )
            }
            ActionKind::CreatePhysicalVolume { device } => {
                format!("Successfully created physical volume {device}")
            }
            ActionKind::ResizePhysicalVolume { name } => {
                format!("Successfully resized physical volume {name}")
            }
            ActionKind::CreateVolumeGroup { name, physical_volume } => {
                format!(
                    "Successfully created volume group {name} on physical \
                     volume {physical_volume}"
                )
            }
            ActionKind::CreateLogicalVolume {
                name,
                volume_group,
                volume_group_percent,
            } => format!(
                "Successfully created logical volume {name} that consumes \
                 {volume_group_percent}% of volume group {volume_group}"
            ),
            ActionKind::ActivateLogicalVolume { name, volume_group } => {
                format!(
                    "Successfully activated logical volume \
                     {volume_group}/{name}"
                )
            }
            ActionKind::ResizeLogicalVolume {
                name,
                volume_group,
                volume_group_percent,
            } => format!(
                "Successfully resized logical volume {volume_group}/{name} to \
                 {volume_group_percent}% of volume group {volume_group}"
            ),
        }
    }
}

/// A planned mutation plus the safety mode it executes under. The mode is
/// attached by the planning layer after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    kind: ActionKind,
    mode: Mode,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, mode: Mode::Empty }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn prompt(&self) -> String {
        self.kind.prompt()
    }

    pub fn refuse(&self) -> String {
        self.kind.refuse()
    }

    pub fn success(&self) -> String {
        self.kind.success()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ActionError {
    #[error("Action rejected. {refuse}")]
    Rejected { refuse: String },

    #[error("Healthcheck mode enabled. {refuse}")]
    Healthcheck { refuse: String },

    #[error("Unsupported mode was encountered. {refuse}")]
    UnsupportedMode { refuse: String },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Executes a plan in order, halting on the first gate refusal or failure.
pub struct ActionExecutor {
    device_service: Arc<dyn DeviceService>,
    file_service: Arc<dyn FileService>,
    lvm_service: Arc<dyn LvmService>,
    file_system_service_factory: Arc<dyn FileSystemServiceFactory>,
    input: Box<dyn BufRead>,
}

impl ActionExecutor {
    pub fn new(
        device_service: Arc<dyn DeviceService>,
        file_service: Arc<dyn FileService>,
        lvm_service: Arc<dyn LvmService>,
        file_system_service_factory: Arc<dyn FileSystemServiceFactory>,
        input: Box<dyn BufRead>,
    ) -> Self {
        Self {
            device_service,
            file_service,
            lvm_service,
            file_system_service_factory,
            input,
        }
    }

    pub fn execute_all(
        &mut self,
        actions: &[Action],
    ) -> Result<(), ActionError> {
        for action in actions {
            self.execute(action)?;
        }
        Ok(())
    }

    fn execute(&mut self, action: &Action) -> Result<(), ActionError> {
        match action.mode() {
            Mode::Force => {}
            Mode::Prompt => {
                if !self.should_proceed(action) {
                    return Err(ActionError::Rejected {
                        refuse: action.refuse(),
                    });
                }
            }
            Mode::Healthcheck => {
                return Err(ActionError::Healthcheck {
                    refuse: action.refuse(),
                });
            }
            Mode::Empty => {
                return Err(ActionError::UnsupportedMode {
                    refuse: action.refuse(),
                });
            }
        }
        self.execute_kind(action.kind())?;
        println!("⭐ {}", action.success());
        Ok(())
    }

    fn should_proceed(&mut self, action: &Action) -> bool {
        print!("🟣 {}? (y/n): ", action.prompt());
        let _ = std::io::stdout().flush();

        let mut response = String::new();
        if self.input.read_line(&mut response).is_err() {
            return false;
        }
        let response = response.trim().to_lowercase();
        response == "y" || response == "yes"
    }

    fn execute_kind(&self, kind: &ActionKind) -> Result<(), ServiceError> {
        match kind {
            ActionKind::FormatDevice { device, file_system } => self
                .file_system_service_factory
                .select(*file_system)?
                .format(device),
            ActionKind::LabelDevice { device, file_system, label } => self
                .file_system_service_factory
                .select(*file_system)?
                .label(device, label),
            ActionKind::MountDevice {
                source,
                target,
                file_system,
                options,
            } => self.device_service.mount(
                source,
                target,
                *file_system,
                options,
            ),
            ActionKind::UnmountDevice { source: _, target } => {
                self.device_service.umount(target)
            }
            ActionKind::CreateDirectory { path } => {
                self.file_service.create_directory(path)
            }
            ActionKind::ChangeOwner { path, uid, gid } => {
                self.file_service.change_owner(path, *uid, *gid)
            }
            ActionKind::ChangePermissions { path, permissions } => {
                self.file_service.change_permissions(path, *permissions)
            }
            ActionKind::ResizeFileSystem { target, file_system, .. } => self
                .file_system_service_factory
                .select(*file_system)?
                .resize(target),
            ActionKind::CreatePhysicalVolume { device } => {
                self.lvm_service.create_physical_volume(device)
            }
            ActionKind::ResizePhysicalVolume { name } => {
                self.lvm_service.resize_physical_volume(name)
            }
            ActionKind::CreateVolumeGroup { name, physical_volume } => {
                self.lvm_service.create_volume_group(name, physical_volume)
            }
            ActionKind::CreateLogicalVolume {
                name,
                volume_group,
                volume_group_percent,
            } => self.lvm_service.create_logical_volume(
                name,
                volume_group,
                *volume_group_percent,
            ),
            ActionKind::ActivateLogicalVolume { name, volume_group } => {
                self.lvm_service.activate_logical_volume(name, volume_group)
            }
            ActionKind::ResizeLogicalVolume {
                name,
                volume_group,
                volume_group_percent,
            } => self.lvm_service.resize_logical_volume(
                name,
                volume_group,
                *volume_group_percent,
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::service::{
        MockDeviceService, MockFileService, MockFileSystemServiceFactory,
        MockLvmService,
    };
    use std::io::Cursor;

    fn executor_with_input(
        input: &str,
        file_service: MockFileService,
    ) -> ActionExecutor {
        ActionExecutor::new(
            Arc::new(MockDeviceService::new()),
            Arc::new(file_service),
            Arc::new(MockLvmService::new()),
            Arc::new(MockFileSystemServiceFactory::new()),
            Box::new(Cursor::new(input.to_string())),
        )
    }

    fn create_directory_action(mode: Mode) -> Action {
        Action::new(ActionKind::CreateDirectory {
            path: Utf8PathBuf::from("/mnt/app"),
        })
        .with_mode(mode)
    }

    #[test]
    fn test_force_runs_immediately() {
        let mut file_service = MockFileService::new();
        file_service
            .expect_create_directory()
            .times(1)
            .returning(|_| Ok(()));
        let mut executor = executor_with_input("", file_service);
        executor
            .execute_all(&[create_directory_action(Mode::Force)])
            .unwrap();
    }

    #[test]
    fn test_healthcheck_never_runs() {
        let mut file_service = MockFileService::new();
        file_service.expect_create_directory().times(0);
        let mut executor = executor_with_input("", file_service);
        let err = executor
            .execute_all(&[create_directory_action(Mode::Healthcheck)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Healthcheck mode enabled. Refused to create directory /mnt/app"
        );
    }

    #[test]
    fn test_empty_mode_is_unsupported() {
        let mut file_service = MockFileService::new();
        file_service.expect_create_directory().times(0);
        let mut executor = executor_with_input("", file_service);
        let err = executor
            .execute_all(&[create_directory_action(Mode::Empty)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported mode was encountered. Refused to create directory \
             /mnt/app"
        );
    }

    #[test]
    fn test_prompt_accepts_y_and_yes() {
        for input in ["y\n", "yes\n", "  YES  \n"] {
            let mut file_service = MockFileService::new();
            file_service
                .expect_create_directory()
                .times(1)
                .returning(|_| Ok(()));
            let mut executor = executor_with_input(input, file_service);
            executor
                .execute_all(&[create_directory_action(Mode::Prompt)])
                .unwrap();
        }
    }

    #[test]
    fn test_prompt_rejects_anything_else() {
        for input in ["n\n", "no\n", "\n", ""] {
            let mut file_service = MockFileService::new();
            file_service.expect_create_directory().times(0);
            let mut executor = executor_with_input(input, file_service);
            let err = executor
                .execute_all(&[create_directory_action(Mode::Prompt)])
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                "Action rejected. Refused to create directory /mnt/app"
            );
        }
    }

    #[test]
    fn test_rejection_halts_the_list() {
        let mut file_service = MockFileService::new();
        // Neither action runs: the first is rejected and halts the list.
        file_service.expect_create_directory().times(0);
        file_service.expect_change_owner().times(0);
        let mut executor = executor_with_input("n\n", file_service);
        let actions = vec![
            create_directory_action(Mode::Prompt),
            Action::new(ActionKind::ChangeOwner {
                path: Utf8PathBuf::from("/mnt/app"),
                uid: 0,
                gid: 0,
            })
            .with_mode(Mode::Force),
        ];
        assert!(executor.execute_all(&actions).is_err());
    }

    #[test]
    fn test_failure_surfaces_unchanged() {
        let mut file_service = MockFileService::new();
        file_service.expect_create_directory().times(1).returning(|path| {
            Err(ServiceError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "permission denied",
                ),
            })
        });
        let mut executor = executor_with_input("", file_service);
        let err = executor
            .execute_all(&[create_directory_action(Mode::Force)])
            .unwrap_err();
        assert_eq!(err.to_string(), "/mnt/app: permission denied");
    }
}
