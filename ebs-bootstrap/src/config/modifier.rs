// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Modifiers rewrite the loaded document in place before reconciliation.

use crate::config::Config;
use crate::service::{DeviceService, NVMeService, ServiceError};
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ModifierError {
    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub trait Modifier {
    fn modify(&self, config: &mut Config) -> Result<(), ModifierError>;
}

/// Re-keys device entries named by their attachment alias (`/dev/sdb`,
/// `ephemeral0`) to the `/dev/nvme*` node the Nitro driver actually
/// exposes them as.
///
/// The operator writes the alias they attached the volume under; on a
/// Nitro instance the kernel surfaces the volume as an NVMe namespace
/// whose controller-identify payload carries that alias back.
pub struct AwsNitroNVMeModifier {
    nvme_service: Arc<dyn NVMeService>,
    device_service: Arc<dyn DeviceService>,
}

impl AwsNitroNVMeModifier {
    pub fn new(
        nvme_service: Arc<dyn NVMeService>,
        device_service: Arc<dyn DeviceService>,
    ) -> Self {
        Self { nvme_service, device_service }
    }
}

impl Modifier for AwsNitroNVMeModifier {
    fn modify(&self, config: &mut Config) -> Result<(), ModifierError> {
        let block_devices = self.device_service.get_block_devices()?;
        for name in block_devices {
            // A device already managed under its kernel name needs no
            // further queries.
            if config.devices.contains_key(&name) {
                continue;
            }
            if !name.starts_with("/dev/nvme") {
                continue;
            }
            let mapping = self.nvme_service.get_block_device_mapping(&name)?;
            println!("🔵 Nitro NVMe detected: {name} -> {mapping}");
            // Detected devices are only re-keyed when the config actually
            // manages them under the external alias.
            let Some(spec) = config.devices.remove(&mapping) else {
                continue;
            };
            config.devices.insert(name, spec);
        }
        Ok(())
    }
}

/// Re-keys every entry with `lvm: <name>` from its block-device path to
/// `/dev/<name>/<name>`, the conventional path of the created logical
/// volume. Applied after the LVM layers so the filesystem layers operate
/// on the logical volume rather than its backing device.
pub struct LvmModifier {}

impl LvmModifier {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for LvmModifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Modifier for LvmModifier {
    fn modify(&self, config: &mut Config) -> Result<(), ModifierError> {
        let keys: Vec<String> = config.devices.keys().cloned().collect();
        for key in keys {
            let Some(lvm) = config.devices[&key].lvm.clone() else {
                continue;
            };
            if lvm.is_empty() {
                continue;
            }
            let logical_device = format!("/dev/{lvm}/{lvm}");
            let spec = config.devices.remove(&key).unwrap();
            config.devices.insert(logical_device, spec);
        }
        Ok(())
    }
}
