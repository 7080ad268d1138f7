// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end reconciliation scenarios against a controllable fake host.
//!
//! The fake host keeps the whole observable state (devices, files, LVM
//! stack) in one structure; every service trait is implemented over it so
//! the real backends, layers, action executor and layer executor run
//! unmodified. Mutations append to an ordered log the scenarios assert on.

use crate::action::ActionExecutor;
use crate::backend::{
    DeviceBackend, DeviceMetricsBackend, FileBackend, LinuxDeviceBackend,
    LinuxDeviceMetricsBackend, LinuxFileBackend, LinuxLvmBackend,
    LinuxOwnerBackend, LvmBackend, OwnerBackend,
};
use crate::config::{Config, LvmModifier, Modifier, Options};
use crate::layer::{
    ActivateLogicalVolumeLayer, ChangeOwnerLayer, ChangePermissionsLayer,
    CreateDirectoryLayer, CreateLogicalVolumeLayer, CreatePhysicalVolumeLayer,
    CreateVolumeGroupLayer, ExponentialBackoffLayerExecutor, FormatDeviceLayer,
    LabelDeviceLayer, Layer, LayerExecutorError, MountDeviceLayer,
    ResizeDeviceLayer, ResizeLogicalVolumeLayer, ResizePhysicalVolumeLayer,
};
use crate::model::{
    BlockDevice, File, FilePermissions, FileSystem, FileType, Group,
    LogicalVolume, LvmDevice, LvmState, Mode, MountOptions, PhysicalVolume,
    User, VolumeGroup,
};
use crate::service::{
    DeviceService, FileService, FileSystemService, FileSystemServiceFactory,
    LvmService, OwnerService, ServiceError,
};
use camino::{Utf8Path, Utf8PathBuf};
use ebs_bootstrap_common::backoff::RetryParameters;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::rc::Rc;
use std::sync::Arc;

// A freshly created filesystem carries a root-owned, group-restricted root
// directory; mounting exposes it in place of the staged mount directory.
const FRESH_ROOT_PERMISSIONS: u32 = 0o700;

const PV_METADATA_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
struct FakeDevice {
    device_id: u64,
    size: u64,
    fs_size: u64,
    file_system: FileSystem,
    label: Option<String>,
    mount_point: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
struct FakeFile {
    file_type: FileType,
    device_id: u64,
    inode_no: u64,
    user_id: u32,
    group_id: u32,
    permissions: u32,
}

#[derive(Debug, Clone)]
struct FakePv {
    name: String,
    size: u64,
}

#[derive(Debug, Clone)]
struct FakeVg {
    name: String,
    physical_volume: String,
    size: u64,
}

#[derive(Debug, Clone)]
struct FakeLv {
    name: String,
    volume_group: String,
    active: bool,
    size: u64,
}

#[derive(Debug, Default)]
struct HostState {
    devices: BTreeMap<String, FakeDevice>,
    files: BTreeMap<Utf8PathBuf, FakeFile>,
    physical_volumes: Vec<FakePv>,
    volume_groups: Vec<FakeVg>,
    logical_volumes: Vec<FakeLv>,
    log: Vec<String>,
    next_id: u64,
}

type Host = Rc<RefCell<HostState>>;

impl HostState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id + 100
    }
}

fn host() -> Host {
    let mut state = HostState::default();
    // The root filesystem: "/" and "/mnt" live on device 1.
    state.files.insert(
        Utf8PathBuf::from("/"),
        FakeFile {
            file_type: FileType::Directory,
            device_id: 1,
            inode_no: 2,
            user_id: 0,
            group_id: 0,
            permissions: 0o755,
        },
    );
    state.files.insert(
        Utf8PathBuf::from("/mnt"),
        FakeFile {
            file_type: FileType::Directory,
            device_id: 1,
            inode_no: 17,
            user_id: 0,
            group_id: 0,
            permissions: 0o755,
        },
    );
    Rc::new(RefCell::new(state))
}

fn add_device(host: &Host, name: &str, size: u64) {
    let mut state = host.borrow_mut();
    let device_id = state.next_id();
    state.devices.insert(
        name.to_string(),
        FakeDevice {
            device_id,
            size,
            fs_size: 0,
            file_system: FileSystem::Unformatted,
            label: None,
            mount_point: None,
        },
    );
}

struct FakeDeviceService {
    host: Host,
}

impl FakeDeviceService {
    fn not_found(name: &str) -> ServiceError {
        ServiceError::ProbeBlockDevice {
            device: name.to_string(),
            source: linux_utils::lsblk::ProbeBlockDeviceError::NotUnique(0),
        }
    }
}

impl DeviceService for FakeDeviceService {
    fn get_size(&self, name: &str) -> Result<u64, ServiceError> {
        let state = self.host.borrow();
        let device =
            state.devices.get(name).ok_or_else(|| Self::not_found(name))?;
        Ok(device.size)
    }

    fn get_block_devices(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.host.borrow().devices.keys().cloned().collect())
    }

    fn get_block_device(&self, name: &str) -> Result<BlockDevice, ServiceError> {
        let state = self.host.borrow();
        let device =
            state.devices.get(name).ok_or_else(|| Self::not_found(name))?;
        Ok(BlockDevice {
            name: name.to_string(),
            mount_point: device.mount_point.clone(),
            file_system: device.file_system,
            label: device.label.clone(),
        })
    }

    fn mount(
        &self,
        source: &str,
        target: &Utf8Path,
        _file_system: FileSystem,
        options: &MountOptions,
    ) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let device_id = state
            .devices
            .get(source)
            .ok_or_else(|| Self::not_found(source))?
            .device_id;
        state.devices.get_mut(source).unwrap().mount_point =
            Some(target.to_path_buf());
        let mounted = FakeFile {
            file_type: FileType::Directory,
            device_id,
            inode_no: 2,
            user_id: 0,
            group_id: 0,
            permissions: FRESH_ROOT_PERMISSIONS,
        };
        state.files.insert(target.to_path_buf(), mounted);
        state.log.push(format!("mount {source} {target} ({options})"));
        Ok(())
    }

    fn umount(&self, target: &Utf8Path) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let source = state
            .devices
            .iter()
            .find(|(_, device)| device.mount_point.as_deref() == Some(target))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| Self::not_found(target.as_str()))?;
        state.devices.get_mut(&source).unwrap().mount_point = None;
        // The staged directory underneath becomes visible again.
        state.files.insert(
            target.to_path_buf(),
            FakeFile {
                file_type: FileType::Directory,
                device_id: 1,
                inode_no: 42,
                user_id: 0,
                group_id: 0,
                permissions: 0o755,
            },
        );
        state.log.push(format!("umount {target}"));
        Ok(())
    }
}

struct FakeFileService {
    host: Host,
}

impl FileService for FakeFileService {
    fn get_file(&self, path: &Utf8Path) -> Result<File, ServiceError> {
        let state = self.host.borrow();
        let file = state.files.get(path).ok_or_else(|| ServiceError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        Ok(File {
            path: path.to_path_buf(),
            file_type: file.file_type,
            device_id: file.device_id,
            inode_no: file.inode_no,
            user_id: file.user_id,
            group_id: file.group_id,
            permissions: FilePermissions::new(file.permissions),
        })
    }

    fn create_directory(&self, path: &Utf8Path) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let inode_no = state.next_id();
        state.files.insert(
            path.to_path_buf(),
            FakeFile {
                file_type: FileType::Directory,
                device_id: 1,
                inode_no,
                user_id: 0,
                group_id: 0,
                permissions: 0o755,
            },
        );
        state.log.push(format!("mkdir -p {path}"));
        Ok(())
    }

    fn change_owner(
        &self,
        path: &Utf8Path,
        uid: u32,
        gid: u32,
    ) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let file = state.files.get_mut(path).unwrap();
        file.user_id = uid;
        file.group_id = gid;
        state.log.push(format!("chown {uid}:{gid} {path}"));
        Ok(())
    }

    fn change_permissions(
        &self,
        path: &Utf8Path,
        permissions: FilePermissions,
    ) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let file = state.files.get_mut(path).unwrap();
        file.permissions = permissions.mode();
        state.log.push(format!("chmod {permissions} {path}"));
        Ok(())
    }
}

#[derive(Debug)]
struct FakeFileSystemService {
    host: Host,
    file_system: FileSystem,
}

impl FileSystemService for FakeFileSystemService {
    fn file_system(&self) -> FileSystem {
        self.file_system
    }

    fn get_size(&self, device: &str) -> Result<u64, ServiceError> {
        Ok(self.host.borrow().devices[device].fs_size)
    }

    fn format(&self, device: &str) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let entry = state.devices.get_mut(device).unwrap();
        entry.file_system = self.file_system;
        entry.fs_size = entry.size;
        state
            .log
            .push(format!("mkfs.{} {device}", self.file_system.as_str()));
        Ok(())
    }

    fn label(&self, device: &str, label: &str) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        state.devices.get_mut(device).unwrap().label =
            Some(label.to_string());
        state.log.push(format!("label {device} {label}"));
        Ok(())
    }

    fn resize(&self, target: &str) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let name = state
            .devices
            .iter()
            .find(|(name, device)| {
                name.as_str() == target
                    || device.mount_point.as_deref()
                        == Some(Utf8Path::new(target))
            })
            .map(|(name, _)| name.clone())
            .unwrap();
        let entry = state.devices.get_mut(&name).unwrap();
        entry.fs_size = entry.size;
        state.log.push(format!("resizefs {target}"));
        Ok(())
    }

    fn maximum_label_length(&self) -> usize {
        match self.file_system {
            FileSystem::Ext4 => 16,
            _ => 12,
        }
    }

    fn resize_requires_mount(&self) -> bool {
        self.file_system == FileSystem::Xfs
    }

    fn label_requires_unmount(&self) -> bool {
        self.file_system == FileSystem::Xfs
    }
}

struct FakeFileSystemServiceFactory {
    host: Host,
}

impl FileSystemServiceFactory for FakeFileSystemServiceFactory {
    fn select(
        &self,
        fs: FileSystem,
    ) -> Result<Arc<dyn FileSystemService>, ServiceError> {
        match fs {
            FileSystem::Ext4 | FileSystem::Xfs => {
                Ok(Arc::new(FakeFileSystemService {
                    host: self.host.clone(),
                    file_system: fs,
                }))
            }
            FileSystem::Unformatted => {
                Err(ServiceError::UnformattedFileSystem)
            }
            FileSystem::LvmMember => {
                Err(ServiceError::UnsupportedFileSystem(fs))
            }
        }
    }
}

struct FakeOwnerService {}

impl OwnerService for FakeOwnerService {
    fn get_current_user(&self) -> Result<User, ServiceError> {
        Ok(User { name: "root".to_string(), id: 0 })
    }

    fn get_current_group(&self) -> Result<Group, ServiceError> {
        Ok(Group { name: "root".to_string(), id: 0 })
    }

    fn get_user(&self, user: &str) -> Result<User, ServiceError> {
        match user.parse::<u32>() {
            Ok(id) => Ok(User { name: format!("user-{id}"), id }),
            Err(_) if user == "app" => {
                Ok(User { name: "app".to_string(), id: 1000 })
            }
            Err(_) => Err(ServiceError::UserNameNotFound(user.to_string())),
        }
    }

    fn get_group(&self, group: &str) -> Result<Group, ServiceError> {
        match group.parse::<u32>() {
            Ok(id) => Ok(Group { name: format!("group-{id}"), id }),
            Err(_) if group == "app" => {
                Ok(Group { name: "app".to_string(), id: 1000 })
            }
            Err(_) => Err(ServiceError::GroupNameNotFound(group.to_string())),
        }
    }
}

struct FakeLvmService {
    host: Host,
}

impl LvmService for FakeLvmService {
    fn get_devices(&self) -> Result<Vec<LvmDevice>, ServiceError> {
        let state = self.host.borrow();
        Ok(state
            .physical_volumes
            .iter()
            .map(|pv| LvmDevice {
                name: pv.name.clone(),
                size: state.devices[&pv.name].size,
            })
            .collect())
    }

    fn get_physical_volumes(&self) -> Result<Vec<PhysicalVolume>, ServiceError> {
        Ok(self
            .host
            .borrow()
            .physical_volumes
            .iter()
            .map(|pv| PhysicalVolume { name: pv.name.clone(), size: pv.size })
            .collect())
    }

    fn get_volume_groups(&self) -> Result<Vec<VolumeGroup>, ServiceError> {
        Ok(self
            .host
            .borrow()
            .volume_groups
            .iter()
            .map(|vg| VolumeGroup {
                name: vg.name.clone(),
                physical_volume: vg.physical_volume.clone(),
                state: LvmState::VolumeGroupInactive,
                size: vg.size,
            })
            .collect())
    }

    fn get_logical_volumes(&self) -> Result<Vec<LogicalVolume>, ServiceError> {
        Ok(self
            .host
            .borrow()
            .logical_volumes
            .iter()
            .map(|lv| LogicalVolume {
                name: lv.name.clone(),
                volume_group: lv.volume_group.clone(),
                state: if lv.active {
                    LvmState::LogicalVolumeActive
                } else {
                    LvmState::LogicalVolumeInactive
                },
                size: lv.size,
            })
            .collect())
    }

    fn create_physical_volume(&self, name: &str) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let size = state.devices[name].size - PV_METADATA_BYTES;
        state.devices.get_mut(name).unwrap().file_system =
            FileSystem::LvmMember;
        state
            .physical_volumes
            .push(FakePv { name: name.to_string(), size });
        state.log.push(format!("pvcreate {name}"));
        Ok(())
    }

    fn create_volume_group(
        &self,
        name: &str,
        physical_volume: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let size = state
            .physical_volumes
            .iter()
            .find(|pv| pv.name == physical_volume)
            .unwrap()
            .size;
        state.volume_groups.push(FakeVg {
            name: name.to_string(),
            physical_volume: physical_volume.to_string(),
            size,
        });
        state.log.push(format!("vgcreate {name} {physical_volume}"));
        Ok(())
    }

    fn create_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let vg_size = state
            .volume_groups
            .iter()
            .find(|vg| vg.name == volume_group)
            .unwrap()
            .size;
        state.logical_volumes.push(FakeLv {
            name: name.to_string(),
            volume_group: volume_group.to_string(),
            active: false,
            size: vg_size * volume_group_percent / 100,
        });
        state.log.push(format!(
            "lvcreate -l {volume_group_percent}%VG -n {name} {volume_group}"
        ));
        Ok(())
    }

    fn activate_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let size = {
            let lv = state
                .logical_volumes
                .iter_mut()
                .find(|lv| lv.name == name && lv.volume_group == volume_group)
                .unwrap();
            lv.active = true;
            lv.size
        };
        // Activation surfaces the logical volume as a block device.
        let device_id = state.next_id();
        state.devices.insert(
            format!("/dev/{volume_group}/{name}"),
            FakeDevice {
                device_id,
                size,
                fs_size: 0,
                file_system: FileSystem::Unformatted,
                label: None,
                mount_point: None,
            },
        );
        state.log.push(format!("lvchange -ay {volume_group}/{name}"));
        Ok(())
    }

    fn resize_physical_volume(&self, name: &str) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let size = state.devices[name].size - PV_METADATA_BYTES;
        state
            .physical_volumes
            .iter_mut()
            .find(|pv| pv.name == name)
            .unwrap()
            .size = size;
        state.log.push(format!("pvresize {name}"));
        Ok(())
    }

    fn resize_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
        volume_group_percent: u64,
    ) -> Result<(), ServiceError> {
        let mut state = self.host.borrow_mut();
        let vg_size = state
            .volume_groups
            .iter()
            .find(|vg| vg.name == volume_group)
            .unwrap()
            .size;
        state
            .logical_volumes
            .iter_mut()
            .find(|lv| lv.name == name && lv.volume_group == volume_group)
            .unwrap()
            .size = vg_size * volume_group_percent / 100;
        state
            .log
            .push(format!("lvextend -l {volume_group_percent}%VG {volume_group}/{name}"));
        Ok(())
    }
}

/// Runs the full pipeline (both layer groups with the LVM re-keying in
/// between) exactly as the binary wires it, over the fake host.
fn reconcile(
    host: &Host,
    mut config: Config,
    input: &str,
) -> Result<(), LayerExecutorError> {
    let device_service: Arc<dyn DeviceService> =
        Arc::new(FakeDeviceService { host: host.clone() });
    let file_service: Arc<dyn FileService> =
        Arc::new(FakeFileService { host: host.clone() });
    let lvm_service: Arc<dyn LvmService> =
        Arc::new(FakeLvmService { host: host.clone() });
    let factory: Arc<dyn FileSystemServiceFactory> =
        Arc::new(FakeFileSystemServiceFactory { host: host.clone() });
    let owner_service: Arc<dyn OwnerService> = Arc::new(FakeOwnerService {});

    let device_backend: Rc<RefCell<dyn DeviceBackend>> = Rc::new(RefCell::new(
        LinuxDeviceBackend::new(device_service.clone(), factory.clone()),
    ));
    let file_backend: Rc<RefCell<dyn FileBackend>> = Rc::new(RefCell::new(
        LinuxFileBackend::new(file_service.clone()),
    ));
    let owner_backend: Rc<RefCell<dyn OwnerBackend>> = Rc::new(RefCell::new(
        LinuxOwnerBackend::new(owner_service),
    ));
    let metrics_backend: Rc<RefCell<dyn DeviceMetricsBackend>> =
        Rc::new(RefCell::new(LinuxDeviceMetricsBackend::new(
            device_service.clone(),
            factory.clone(),
        )));
    let lvm_backend: Rc<RefCell<dyn LvmBackend>> =
        Rc::new(RefCell::new(LinuxLvmBackend::new(lvm_service.clone())));

    let action_executor = ActionExecutor::new(
        device_service,
        file_service,
        lvm_service,
        factory,
        Box::new(Cursor::new(input.to_string())),
    );
    let mut layer_executor = ExponentialBackoffLayerExecutor::new(
        action_executor,
        RetryParameters {
            initial_interval: std::time::Duration::from_millis(1),
            multiplier: 2,
            max_retries: 3,
        },
    );

    let lvm_layers: Vec<Box<dyn Layer>> = vec![
        Box::new(CreatePhysicalVolumeLayer::new(
            device_backend.clone(),
            lvm_backend.clone(),
        )),
        Box::new(ResizePhysicalVolumeLayer::new(lvm_backend.clone())),
        Box::new(CreateVolumeGroupLayer::new(lvm_backend.clone())),
        Box::new(CreateLogicalVolumeLayer::new(lvm_backend.clone())),
        Box::new(ActivateLogicalVolumeLayer::new(lvm_backend.clone())),
        Box::new(ResizeLogicalVolumeLayer::new(lvm_backend.clone())),
    ];
    layer_executor.execute(&lvm_layers, &config)?;

    LvmModifier::new().modify(&mut config).expect("lvm re-keying");

    let file_system_layers: Vec<Box<dyn Layer>> = vec![
        Box::new(FormatDeviceLayer::new(device_backend.clone())),
        Box::new(LabelDeviceLayer::new(device_backend.clone())),
        Box::new(CreateDirectoryLayer::new(file_backend.clone())),
        Box::new(MountDeviceLayer::new(
            device_backend.clone(),
            file_backend.clone(),
        )),
        Box::new(ResizeDeviceLayer::new(device_backend, metrics_backend)),
        Box::new(ChangeOwnerLayer::new(owner_backend, file_backend.clone())),
        Box::new(ChangePermissionsLayer::new(file_backend)),
    ];
    layer_executor.execute(&file_system_layers, &config)
}

fn taken_log(host: &Host) -> Vec<String> {
    std::mem::take(&mut host.borrow_mut().log)
}

fn healthcheck(config: &str) -> Config {
    let mut config = Config::parse(config).unwrap();
    config.set_overrides(Options {
        mode: Some(Mode::Healthcheck),
        ..Default::default()
    });
    config
}

const FRESH_EXT4: &str = "\
devices:
  /dev/xvdf:
    fs: ext4
    mountPoint: /mnt/app
    user: 0
    group: 0
    permissions: 755
    mode: force
";

#[test]
fn test_fresh_ext4_volume_in_force_mode() {
    let host = host();
    add_device(&host, "/dev/xvdf", 1073741824);

    reconcile(&host, Config::parse(FRESH_EXT4).unwrap(), "").unwrap();
    assert_eq!(
        taken_log(&host),
        vec![
            "mkfs.ext4 /dev/xvdf",
            "mkdir -p /mnt/app",
            "mount /dev/xvdf /mnt/app (defaults)",
            "chmod 0o755 /mnt/app",
        ]
    );

    // Second run: already converged, so nothing is mutated; healthcheck
    // mode would reject the first planned action, proving the plan is
    // empty.
    reconcile(&host, healthcheck(FRESH_EXT4), "").unwrap();
    assert!(taken_log(&host).is_empty());
}

#[test]
fn test_healthcheck_never_mutates_a_divergent_host() {
    let host = host();
    add_device(&host, "/dev/xvdf", 1073741824);

    let err = reconcile(&host, healthcheck(FRESH_EXT4), "").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Healthcheck mode enabled. Refused to format /dev/xvdf to ext4"
    );
    assert!(taken_log(&host).is_empty());
}

#[test]
fn test_xfs_relabel_while_mounted() {
    let host = host();
    add_device(&host, "/dev/xvdf", 1073741824);
    {
        let mut state = host.borrow_mut();
        let device = state.devices.get_mut("/dev/xvdf").unwrap();
        device.file_system = FileSystem::Xfs;
        device.fs_size = 1073741824;
        device.label = Some("old".to_string());
        device.mount_point = Some(Utf8PathBuf::from("/mnt/app"));
        let device_id = state.devices["/dev/xvdf"].device_id;
        state.files.insert(
            Utf8PathBuf::from("/mnt/app"),
            FakeFile {
                file_type: FileType::Directory,
                device_id,
                inode_no: 2,
                user_id: 0,
                group_id: 0,
                permissions: 0o755,
            },
        );
    }

    let config = Config::parse(
        "\
devices:
  /dev/xvdf:
    fs: xfs
    mountPoint: /mnt/app
    label: new
    mode: force
",
    )
    .unwrap();
    reconcile(&host, config, "").unwrap();
    assert_eq!(
        taken_log(&host),
        vec![
            "umount /mnt/app",
            "label /dev/xvdf new",
            "mount /dev/xvdf /mnt/app (defaults)",
        ]
    );
}

fn resize_config(threshold: &str) -> String {
    format!(
        "\
devices:
  /dev/xvdf:
    fs: ext4
    mountPoint: /mnt/app
    resizeFs: true
    resizeThreshold: {threshold}
    mode: force
"
    )
}

fn mounted_ext4_host(size: u64, fs_size: u64) -> Host {
    let host = host();
    add_device(&host, "/dev/xvdf", size);
    let mut state = host.borrow_mut();
    let device = state.devices.get_mut("/dev/xvdf").unwrap();
    device.file_system = FileSystem::Ext4;
    device.fs_size = fs_size;
    device.mount_point = Some(Utf8PathBuf::from("/mnt/app"));
    let device_id = state.devices["/dev/xvdf"].device_id;
    state.files.insert(
        Utf8PathBuf::from("/mnt/app"),
        FakeFile {
            file_type: FileType::Directory,
            device_id,
            inode_no: 2,
            user_id: 0,
            group_id: 0,
            permissions: 0o755,
        },
    );
    drop(state);
    host
}

#[test]
fn test_resize_not_needed() {
    let host = mounted_ext4_host(1_000_000, 999_990);
    let config = Config::parse(&resize_config("99.9")).unwrap();
    reconcile(&host, config, "").unwrap();
    assert!(taken_log(&host).is_empty());
}

#[test]
fn test_resize_needed() {
    let host = mounted_ext4_host(1_000_000, 999_989);
    let config = Config::parse(&resize_config("99.999")).unwrap();
    reconcile(&host, config, "").unwrap();
    assert_eq!(taken_log(&host), vec!["resizefs /dev/xvdf"]);
}

const LVM_CHAIN: &str = "\
devices:
  /dev/xvdf:
    fs: ext4
    mountPoint: /mnt/data
    lvm: data
    lvmConsumption: 80
    mode: force
";

#[test]
fn test_lvm_chain() {
    let host = host();
    add_device(&host, "/dev/xvdf", 1073741824);

    reconcile(&host, Config::parse(LVM_CHAIN).unwrap(), "").unwrap();
    assert_eq!(
        taken_log(&host),
        vec![
            "pvcreate /dev/xvdf",
            "vgcreate data /dev/xvdf",
            "lvcreate -l 80%VG -n data data",
            "lvchange -ay data/data",
            "mkfs.ext4 /dev/data/data",
            "mkdir -p /mnt/data",
            "mount /dev/data/data /mnt/data (defaults)",
        ]
    );

    // Converged: a healthcheck pass finds nothing to do.
    reconcile(&host, healthcheck(LVM_CHAIN), "").unwrap();
    assert!(taken_log(&host).is_empty());
}

#[test]
fn test_prompt_rejection_halts_the_run() {
    let host = host();
    add_device(&host, "/dev/xvdf", 1073741824);

    let config = Config::parse(
        "\
devices:
  /dev/xvdf:
    fs: ext4
    mountPoint: /mnt/app
    mode: prompt
",
    )
    .unwrap();
    let err = reconcile(&host, config, "n\n").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Action rejected. Refused to format /dev/xvdf to ext4"
    );
    assert!(taken_log(&host).is_empty());
}

#[test]
fn test_mount_point_of_another_device_is_protected() {
    let host = host();
    add_device(&host, "/dev/xvdf", 1073741824);
    add_device(&host, "/dev/xvdg", 1073741824);
    {
        // /dev/xvdg already owns /mnt/app.
        let mut state = host.borrow_mut();
        let device = state.devices.get_mut("/dev/xvdg").unwrap();
        device.file_system = FileSystem::Ext4;
        device.fs_size = 1073741824;
        device.mount_point = Some(Utf8PathBuf::from("/mnt/app"));
        let device_id = state.devices["/dev/xvdg"].device_id;
        state.files.insert(
            Utf8PathBuf::from("/mnt/app"),
            FakeFile {
                file_type: FileType::Directory,
                device_id,
                inode_no: 2,
                user_id: 0,
                group_id: 0,
                permissions: 0o755,
            },
        );
        let device = state.devices.get_mut("/dev/xvdf").unwrap();
        device.file_system = FileSystem::Ext4;
        device.fs_size = 1073741824;
    }

    let config = Config::parse(
        "\
devices:
  /dev/xvdf:
    fs: ext4
    mountPoint: /mnt/app
    mode: force
",
    )
    .unwrap();
    let err = reconcile(&host, config, "").unwrap_err();
    assert_eq!(
        err.to_string(),
        "/dev/xvdf: /mnt/app is already mounted by another device"
    );
    assert!(taken_log(&host).is_empty());
}
