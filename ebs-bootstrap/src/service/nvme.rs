// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::service::ServiceError;
use linux_utils::nvme::{identify_controller, NvmeIdentifyController};
use regex::Regex;
use std::sync::OnceLock;

const AMZN_NVME_VID: u16 = 0x1D0F;
const AMZN_NVME_EBS_MN: &str = "Amazon Elastic Block Store";
const AMZN_NVME_INS_MN: &str = "Amazon EC2 NVMe Instance Storage";

const INSTANCE_STORE_PATTERN: &str = "^(ephemeral[0-9]):(sd[a-z]|none)";

fn instance_store_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(INSTANCE_STORE_PATTERN).unwrap())
}

/// Maps cloud-vendor NVMe controllers to the external block-device name
/// the operator configured the volume under.
#[cfg_attr(test, mockall::automock)]
pub trait NVMeService {
    /// The `/dev/...` name the volume was attached as, derived from the
    /// controller-identify payload of the NVMe device node.
    fn get_block_device_mapping(
        &self,
        device: &str,
    ) -> Result<String, ServiceError>;
}

pub struct AwsNitroNVMeService {}

impl AwsNitroNVMeService {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for AwsNitroNVMeService {
    fn default() -> Self {
        Self::new()
    }
}

fn is_ebs_volume(id: &NvmeIdentifyController) -> bool {
    id.vid == AMZN_NVME_VID && id.model_number() == AMZN_NVME_EBS_MN
}

fn is_instance_store_volume(id: &NvmeIdentifyController) -> bool {
    id.vid == AMZN_NVME_VID && id.model_number() == AMZN_NVME_INS_MN
}

/// Decodes the vendor-specific allocation of an identify payload into a
/// block-device mapping.
///
/// EBS carries the name directly (`sdb` or `/dev/sdb`, space-padded).
/// Instance storage carries `ephemeralN:sdX` or `ephemeralN:none`
/// (null-padded); the `none` form falls back to the `ephemeralN` name
/// itself. The result always carries a `/dev/` prefix.
fn block_device_mapping(
    device: &str,
    id: &NvmeIdentifyController,
) -> Result<String, ServiceError> {
    let mut bdm = String::new();
    if is_ebs_volume(id) {
        bdm = id.vendor_block_device();
    }
    if is_instance_store_volume(id) {
        let vs = id.vendor_block_device();
        let captures = instance_store_regex().captures(&vs).ok_or_else(|| {
            ServiceError::InstanceStoreMetadata {
                device: device.to_string(),
                pattern: INSTANCE_STORE_PATTERN,
                actual: vs.clone(),
            }
        })?;
        bdm = if &captures[2] == "none" {
            captures[1].to_string()
        } else {
            captures[2].to_string()
        };
    }
    if bdm.is_empty() {
        return Err(ServiceError::NotAwsManagedNvme(device.to_string()));
    }
    if !bdm.starts_with("/dev/") {
        bdm = format!("/dev/{bdm}");
    }
    Ok(bdm)
}

impl NVMeService for AwsNitroNVMeService {
    fn get_block_device_mapping(
        &self,
        device: &str,
    ) -> Result<String, ServiceError> {
        let id = identify_controller(device)?;
        block_device_mapping(device, &id)
    }
}
