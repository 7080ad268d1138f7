// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for probing block devices via `lsblk`.

use crate::process::{stdout_string, BoxedExecutor};
use crate::utility::Utility;
use camino::Utf8PathBuf;
use serde::Deserialize;

/// Error returned by [`Lsblk::list_block_devices`].
#[derive(thiserror::Error, Debug)]
pub enum ListBlockDevicesError {
    #[error(transparent)]
    Execution(#[from] crate::ExecutionError),

    #[error("Failed to decode lsblk response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Error returned by [`Lsblk::probe_block_device`].
#[derive(thiserror::Error, Debug)]
pub enum ProbeBlockDeviceError {
    #[error(transparent)]
    Execution(#[from] crate::ExecutionError),

    #[error("Failed to decode lsblk response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(
        "An unexpected number of block devices were returned: \
         Expected=1 Actual={0}"
    )]
    NotUnique(usize),
}

#[derive(Debug, Deserialize)]
struct LsblkReport {
    #[serde(default)]
    blockdevices: Vec<LsblkRow>,
}

#[derive(Debug, Deserialize)]
struct LsblkRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    fstype: Option<String>,
    #[serde(default)]
    mountpoint: Option<String>,
}

/// A single device row from the probe, before any interpretation of the
/// filesystem type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDeviceProbe {
    pub label: Option<String>,
    pub fstype: Option<String>,
    pub mount_point: Option<Utf8PathBuf>,
}

/// Wraps commands for interacting with `lsblk`.
pub struct Lsblk {}

impl Lsblk {
    /// Lists the top-level block devices of the host, each normalised to a
    /// `/dev/<name>` path.
    pub fn list_block_devices(
        executor: &BoxedExecutor,
    ) -> Result<Vec<String>, ListBlockDevicesError> {
        let mut command =
            Utility::Lsblk.command(&["--nodeps", "-o", "NAME", "-J"]);
        let output = executor.execute(&mut command)?;
        let report: LsblkReport =
            serde_json::from_str(&stdout_string(&output))?;
        Ok(report
            .blockdevices
            .into_iter()
            .map(|row| format!("/dev/{}", row.name.unwrap_or_default()))
            .collect())
    }

    /// Probes label, filesystem type and mount point of one device. Exactly
    /// one row is expected; aliases (`/dev/sdb` style) are accepted by the
    /// utility and reported under the alias we asked for.
    pub fn probe_block_device(
        executor: &BoxedExecutor,
        device: &str,
    ) -> Result<BlockDeviceProbe, ProbeBlockDeviceError> {
        let mut command = Utility::Lsblk.command(&[
            "--nodeps",
            "-o",
            "LABEL,FSTYPE,MOUNTPOINT",
            "-J",
            device,
        ]);
        let output = executor.execute(&mut command)?;
        let report: LsblkReport =
            serde_json::from_str(&stdout_string(&output))?;
        if report.blockdevices.len() != 1 {
            return Err(ProbeBlockDeviceError::NotUnique(
                report.blockdevices.len(),
            ));
        }
        let row = report.blockdevices.into_iter().next().unwrap();
        Ok(BlockDeviceProbe {
            label: row.label,
            fstype: row.fstype,
            mount_point: row.mountpoint.map(Utf8PathBuf::from),
        })
    }
}
