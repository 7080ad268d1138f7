// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI that reconciles a host's block storage toward a declared state.

use clap::error::ErrorKind;
use clap::Parser;
use ebs_bootstrap::action::ActionExecutor;
use ebs_bootstrap::backend::{
    DeviceBackend, DeviceMetricsBackend, FileBackend, LinuxDeviceBackend,
    LinuxDeviceMetricsBackend, LinuxFileBackend, LinuxLvmBackend,
    LinuxOwnerBackend, LvmBackend, OwnerBackend,
};
use ebs_bootstrap::config::{
    AwsNitroNVMeModifier, Config, DeviceValidator, FileSystemValidator, Flags,
    LvmConsumptionValidator, LvmModifier, ModeValidator, Modifier,
    MountOptionsValidator, MountPointValidator, OwnerValidator,
    ResizeThresholdValidator, Validator,
};
use ebs_bootstrap::layer::{
    ActivateLogicalVolumeLayer, ChangeOwnerLayer, ChangePermissionsLayer,
    CreateDirectoryLayer, CreateLogicalVolumeLayer, CreatePhysicalVolumeLayer,
    CreateVolumeGroupLayer, ExponentialBackoffLayerExecutor, FormatDeviceLayer,
    LabelDeviceLayer, Layer, MountDeviceLayer, ResizeDeviceLayer,
    ResizeLogicalVolumeLayer, ResizePhysicalVolumeLayer,
};
use ebs_bootstrap::service::{
    AwsNitroNVMeService, DeviceService, FileService, FileSystemServiceFactory,
    LinuxDeviceService, LinuxFileSystemServiceFactory, LinuxLvmService,
    LvmService, NVMeService, OwnerService, UnixFileService, UnixOwnerService,
};
use ebs_bootstrap_common::backoff::RetryParameters;
use ebs_bootstrap_common::cmd::{fatal, CmdError};
use linux_utils::process::HostExecutor;
use slog::{o, Drain, Logger};
use std::cell::RefCell;
use std::io::BufReader;
use std::rc::Rc;
use std::sync::Arc;

fn main() {
    if let Err(err) = run() {
        fatal(err);
    }
}

fn run() -> Result<(), CmdError> {
    let flags = Flags::try_parse().map_err(|err| match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
        _ => CmdError::Usage(err.to_string()),
    })?;

    let log = logger();

    // Services
    let executor = HostExecutor::new(log.clone()).as_executor();
    let device_service: Arc<dyn DeviceService> =
        Arc::new(LinuxDeviceService::new(executor.clone()));
    let file_service: Arc<dyn FileService> = Arc::new(UnixFileService::new());
    let owner_service: Arc<dyn OwnerService> =
        Arc::new(UnixOwnerService::new());
    let nvme_service: Arc<dyn NVMeService> =
        Arc::new(AwsNitroNVMeService::new());
    let lvm_service: Arc<dyn LvmService> =
        Arc::new(LinuxLvmService::new(executor.clone()));
    let file_system_service_factory: Arc<dyn FileSystemServiceFactory> =
        Arc::new(LinuxFileSystemServiceFactory::new(executor));

    warnings(owner_service.as_ref());

    // Config + flag overrides
    let mut config =
        Config::load(&flags).map_err(|err| CmdError::Failure(err.into()))?;

    // Modify config
    let modifiers: Vec<Box<dyn Modifier>> = vec![Box::new(
        AwsNitroNVMeModifier::new(nvme_service, device_service.clone()),
    )];
    for modifier in &modifiers {
        modifier
            .modify(&mut config)
            .map_err(|err| CmdError::Failure(err.into()))?;
    }

    // Validate config
    let validators: Vec<Box<dyn Validator>> = vec![
        Box::new(FileSystemValidator::new()),
        Box::new(ModeValidator::new()),
        Box::new(ResizeThresholdValidator::new()),
        Box::new(LvmConsumptionValidator::new()),
        Box::new(MountPointValidator::new()),
        Box::new(MountOptionsValidator::new()),
        Box::new(OwnerValidator::new(owner_service.clone())),
        Box::new(DeviceValidator::new(device_service.clone())),
    ];
    for validator in &validators {
        validator
            .validate(&config)
            .map_err(|err| CmdError::Failure(err.into()))?;
    }

    // Backends, shared across the layers that read them
    let device_backend: Rc<RefCell<dyn DeviceBackend>> =
        Rc::new(RefCell::new(LinuxDeviceBackend::new(
            device_service.clone(),
            file_system_service_factory.clone(),
        )));
    let file_backend: Rc<RefCell<dyn FileBackend>> = Rc::new(RefCell::new(
        LinuxFileBackend::new(file_service.clone()),
    ));
    let owner_backend: Rc<RefCell<dyn OwnerBackend>> = Rc::new(RefCell::new(
        LinuxOwnerBackend::new(owner_service.clone()),
    ));
    let device_metrics_backend: Rc<RefCell<dyn DeviceMetricsBackend>> =
        Rc::new(RefCell::new(LinuxDeviceMetricsBackend::new(
            device_service.clone(),
            file_system_service_factory.clone(),
        )));
    let lvm_backend: Rc<RefCell<dyn LvmBackend>> =
        Rc::new(RefCell::new(LinuxLvmBackend::new(lvm_service.clone())));

    let action_executor = ActionExecutor::new(
        device_service,
        file_service,
        lvm_service,
        file_system_service_factory,
        Box::new(BufReader::new(std::io::stdin())),
    );
    let mut layer_executor = ExponentialBackoffLayerExecutor::new(
        action_executor,
        RetryParameters::default(),
    );

    // The LVM stack is converged first, against the raw block devices.
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
    layer_executor
        .execute(&lvm_layers, &config)
        .map_err(|err| CmdError::Failure(err.into()))?;

    // Devices that grew an LVM stack are now addressed through their
    // logical volume, so the filesystem layers target /dev/<vg>/<lv>.
    LvmModifier::new()
        .modify(&mut config)
        .map_err(|err| CmdError::Failure(err.into()))?;

    let file_system_layers: Vec<Box<dyn Layer>> = vec![
        Box::new(FormatDeviceLayer::new(device_backend.clone())),
        Box::new(LabelDeviceLayer::new(device_backend.clone())),
        Box::new(CreateDirectoryLayer::new(file_backend.clone())),
        Box::new(MountDeviceLayer::new(
            device_backend.clone(),
            file_backend.clone(),
        )),
        Box::new(ResizeDeviceLayer::new(
            device_backend,
            device_metrics_backend,
        )),
        Box::new(ChangeOwnerLayer::new(owner_backend, file_backend.clone())),
        Box::new(ChangePermissionsLayer::new(file_backend)),
    ];
    layer_executor
        .execute(&file_system_layers, &config)
        .map_err(|err| CmdError::Failure(err.into()))?;

    println!("🟢 Passed all validation checks");
    Ok(())
}

fn logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator)
        .build()
        .filter_level(slog::Level::Info)
        .fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!("component" => "ebs-bootstrap"))
}

fn warnings(owner_service: &dyn OwnerService) {
    let Ok(user) = owner_service.get_current_user() else {
        return;
    };
    if user.id != 0 {
        println!(
            "🚧 Not running as root user. Device operations might yield \
             unexpected results"
        );
    }
}
