// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for identifying NVMe controllers (`man ioctl`, NVMe admin
//! command set).
//!
//! The layouts below mirror the controller-identify data structure of the
//! NVMe specification closely enough to reach the fields the tool needs:
//! the vendor id, the model number, and the 1024-byte vendor-specific block
//! at offset 3072 that cloud vendors use to carry the external
//! block-device mapping.

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

pub const NVME_ADMIN_IDENTIFY: u8 = 0x06;
pub const NVME_IOCTL_ADMIN_CMD: libc::c_ulong = 0xC048_4E41;

#[derive(Clone, Copy)]
#[repr(C)]
struct NvmeAdminCommand {
    opcode: u8,
    flags: u8,
    cid: u16,
    nsid: u32,
    reserved0: u64,
    mptr: u64,
    addr: u64,
    mlen: u32,
    alen: u32,
    cdw10: u32,
    cdw11: u32,
    cdw12: u32,
    cdw13: u32,
    cdw14: u32,
    cdw15: u32,
    reserved1: u64,
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct NvmeIdentifyControllerPsd {
    pub mp: u16,
    reserved0: u16,
    pub enlat: u32,
    pub exlat: u32,
    pub rrt: u8,
    pub rrl: u8,
    pub rwt: u8,
    pub rwl: u8,
    reserved1: [u8; 16],
}

/// The vendor-specific allocation at the tail of the controller-identify
/// payload. The first 32 bytes carry the external block-device name on
/// cloud-vendor controllers.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct NvmeIdentifyControllerVs {
    pub bdev: [u8; 32],
    reserved0: [u8; 1024 - 32],
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct NvmeIdentifyController {
    pub vid: u16,
    pub ssvid: u16,
    pub sn: [u8; 20],
    pub mn: [u8; 40],
    pub fr: [u8; 8],
    pub rab: u8,
    pub ieee: [u8; 3],
    pub mic: u8,
    pub mdts: u8,
    reserved0: [u8; 256 - 78],
    pub oacs: u16,
    pub acl: u8,
    pub aerl: u8,
    pub frmw: u8,
    pub lpa: u8,
    pub elpe: u8,
    pub npss: u8,
    pub avscc: u8,
    reserved1: [u8; 512 - 265],
    pub sqes: u8,
    pub cqes: u8,
    reserved2: u16,
    pub nn: u32,
    pub oncs: u16,
    pub fuses: u16,
    pub fna: u8,
    pub vwc: u8,
    pub awun: u16,
    pub awupf: u16,
    pub nvscc: u8,
    reserved3: [u8; 704 - 531],
    reserved4: [u8; 2048 - 704],
    pub psd: [NvmeIdentifyControllerPsd; 32],
    pub vs: NvmeIdentifyControllerVs,
}

impl NvmeIdentifyController {
    /// A zero-filled payload, as handed to the ioctl for population.
    pub fn zeroed() -> Self {
        // Safety: the struct is plain-old-data; every bit pattern of zeroes
        // is a valid value for its integer and array fields.
        unsafe { std::mem::zeroed() }
    }

    /// The model number, with the 0x20-padding trimmed.
    pub fn model_number(&self) -> String {
        String::from_utf8_lossy(&self.mn)
            .trim_end_matches(' ')
            .to_string()
    }

    /// The first 32 bytes of the vendor-specific allocation with trailing
    /// padding trimmed. EC2 pads with 0x00 while EBS pads with 0x20, so
    /// both are stripped.
    pub fn vendor_block_device(&self) -> String {
        String::from_utf8_lossy(&self.vs.bdev)
            .trim_end_matches(['\0', ' '])
            .to_string()
    }
}

/// Error returned by [`identify_controller`].
#[derive(thiserror::Error, Debug)]
pub enum IdentifyError {
    #[error("{device}: {err}")]
    Open { device: String, err: io::Error },

    #[error("{device}: ioctl error: {err}")]
    Ioctl { device: String, err: io::Error },
}

/// Issues an `ADMIN_IDENTIFY` (opcode 0x06, cdw10=1) against the device
/// node and returns the populated 4 KiB controller-identify payload.
pub fn identify_controller(
    device: &str,
) -> Result<NvmeIdentifyController, IdentifyError> {
    let file = File::open(device).map_err(|err| IdentifyError::Open {
        device: device.to_string(),
        err,
    })?;

    let mut id = NvmeIdentifyController::zeroed();
    let mut command = NvmeAdminCommand {
        opcode: NVME_ADMIN_IDENTIFY,
        flags: 0,
        cid: 0,
        nsid: 0,
        reserved0: 0,
        mptr: 0,
        addr: &mut id as *mut NvmeIdentifyController as u64,
        mlen: 0,
        alen: std::mem::size_of::<NvmeIdentifyController>() as u32,
        cdw10: 1,
        cdw11: 0,
        cdw12: 0,
        cdw13: 0,
        cdw14: 0,
        cdw15: 0,
        reserved1: 0,
    };

    // Safety: `NVME_IOCTL_ADMIN_CMD` takes a pointer to an admin command
    // whose `addr`/`alen` describe a buffer the kernel writes the identify
    // payload into; both the command and the buffer live until the call
    // returns.
    let rc = unsafe {
        libc::ioctl(file.as_raw_fd(), NVME_IOCTL_ADMIN_CMD, &mut command)
    };
    if rc != 0 {
        return Err(IdentifyError::Ioctl {
            device: device.to_string(),
            err: io::Error::last_os_error(),
        });
    }
    Ok(id)
}
