// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for querying and mutating the LVM stack (`pvs`, `vgs`, `lvs`,
//! `pvcreate`, `vgcreate`, `lvcreate`, `lvchange`, `pvresize`, `lvextend`).
//!
//! The query commands ask for byte-denominated JSON reports
//! (`--reportformat json --units b --nosuffix`); sizes arrive as strings and
//! are parsed here.

use crate::process::{stdout_string, BoxedExecutor};
use crate::utility::Utility;
use serde::Deserialize;

/// Error returned by the LVM report queries.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Execution(#[from] crate::ExecutionError),

    #[error("Failed to decode {utility} response: {source}")]
    Decode { utility: Utility, source: serde_json::Error },

    #[error("{utility} returned an empty report")]
    EmptyReport { utility: Utility },

    #[error("Failed to cast {what} to unsigned 64-bit integer")]
    ParseSize { what: &'static str, source: std::num::ParseIntError },
}

#[derive(Debug, Deserialize)]
struct PvsReport {
    report: Vec<PvsReportEntry>,
}

#[derive(Debug, Deserialize)]
struct PvsReportEntry {
    #[serde(default)]
    pv: Vec<PvsRow>,
}

#[derive(Debug, Deserialize)]
struct PvsRow {
    pv_name: String,
    #[serde(default)]
    pv_size: Option<String>,
    #[serde(default)]
    dev_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VgsReport {
    report: Vec<VgsReportEntry>,
}

#[derive(Debug, Deserialize)]
struct VgsReportEntry {
    #[serde(default)]
    vg: Vec<VgsRow>,
}

#[derive(Debug, Deserialize)]
struct VgsRow {
    vg_name: String,
    pv_name: String,
    vg_size: String,
}

#[derive(Debug, Deserialize)]
struct LvsReport {
    report: Vec<LvsReportEntry>,
}

#[derive(Debug, Deserialize)]
struct LvsReportEntry {
    #[serde(default)]
    lv: Vec<LvsRow>,
}

#[derive(Debug, Deserialize)]
struct LvsRow {
    lv_name: String,
    vg_name: String,
    lv_attr: String,
    lv_size: String,
}

/// One row of `pvs -o pv_name,dev_size`: the backing device of a physical
/// volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvDeviceReport {
    pub pv_name: String,
    pub dev_size: u64,
}

/// One row of `pvs -o pv_name,pv_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalVolumeReport {
    pub pv_name: String,
    pub pv_size: u64,
}

/// One row of `vgs -o vg_name,pv_name,vg_size`. A volume group spanning
/// multiple physical volumes produces one row per parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeGroupReport {
    pub vg_name: String,
    pub pv_name: String,
    pub vg_size: u64,
}

/// One row of `lvs -o lv_name,vg_name,lv_attr,lv_size`. The raw attribute
/// string is surfaced; callers decode the state bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalVolumeReport {
    pub lv_name: String,
    pub vg_name: String,
    pub lv_attr: String,
    pub lv_size: u64,
}

const REPORT_ARGS: [&str; 5] =
    ["--reportformat", "json", "--units", "b", "--nosuffix"];

fn parse_size(
    what: &'static str,
    size: &str,
) -> Result<u64, ReportError> {
    size.parse()
        .map_err(|source| ReportError::ParseSize { what, source })
}

/// Wraps commands for interacting with LVM.
pub struct Lvm {}

impl Lvm {
    fn report_output(
        executor: &BoxedExecutor,
        utility: Utility,
        fields: &str,
    ) -> Result<String, ReportError> {
        let mut args = vec!["-o", fields];
        args.extend(REPORT_ARGS);
        let mut command = utility.command(&args);
        let output = executor.execute(&mut command)?;
        Ok(stdout_string(&output))
    }

    /// The devices backing every physical volume on the host.
    pub fn list_pv_devices(
        executor: &BoxedExecutor,
    ) -> Result<Vec<PvDeviceReport>, ReportError> {
        let stdout = Self::report_output(executor, Utility::Pvs, "pv_name,dev_size")?;
        let report: PvsReport = serde_json::from_str(&stdout).map_err(|source| {
            ReportError::Decode { utility: Utility::Pvs, source }
        })?;
        let entry = report
            .report
            .into_iter()
            .next()
            .ok_or(ReportError::EmptyReport { utility: Utility::Pvs })?;
        entry
            .pv
            .into_iter()
            .map(|row| {
                Ok(PvDeviceReport {
                    pv_name: row.pv_name,
                    dev_size: parse_size(
                        "device size",
                        row.dev_size.as_deref().unwrap_or_default(),
                    )?,
                })
            })
            .collect()
    }

    /// Every physical volume on the host.
    pub fn list_physical_volumes(
        executor: &BoxedExecutor,
    ) -> Result<Vec<PhysicalVolumeReport>, ReportError> {
        let stdout = Self::report_output(executor, Utility::Pvs, "pv_name,pv_size")?;
        let report: PvsReport = serde_json::from_str(&stdout).map_err(|source| {
            ReportError::Decode { utility: Utility::Pvs, source }
        })?;
        let entry = report
            .report
            .into_iter()
            .next()
            .ok_or(ReportError::EmptyReport { utility: Utility::Pvs })?;
        entry
            .pv
            .into_iter()
            .map(|row| {
                Ok(PhysicalVolumeReport {
                    pv_name: row.pv_name,
                    pv_size: parse_size(
                        "physical volume size",
                        row.pv_size.as_deref().unwrap_or_default(),
                    )?,
                })
            })
            .collect()
    }

    /// Every volume group on the host, one row per parent physical volume.
    pub fn list_volume_groups(
        executor: &BoxedExecutor,
    ) -> Result<Vec<VolumeGroupReport>, ReportError> {
        let stdout =
            Self::report_output(executor, Utility::Vgs, "vg_name,pv_name,vg_size")?;
        let report: VgsReport = serde_json::from_str(&stdout).map_err(|source| {
            ReportError::Decode { utility: Utility::Vgs, source }
        })?;
        let entry = report
            .report
            .into_iter()
            .next()
            .ok_or(ReportError::EmptyReport { utility: Utility::Vgs })?;
        entry
            .vg
            .into_iter()
            .map(|row| {
                Ok(VolumeGroupReport {
                    vg_name: row.vg_name,
                    pv_name: row.pv_name,
                    vg_size: parse_size("volume group size", &row.vg_size)?,
                })
            })
            .collect()
    }

    /// Every logical volume on the host.
    pub fn list_logical_volumes(
        executor: &BoxedExecutor,
    ) -> Result<Vec<LogicalVolumeReport>, ReportError> {
        let stdout = Self::report_output(
            executor,
            Utility::Lvs,
            "lv_name,vg_name,lv_attr,lv_size",
        )?;
        let report: LvsReport = serde_json::from_str(&stdout).map_err(|source| {
            ReportError::Decode { utility: Utility::Lvs, source }
        })?;
        let entry = report
            .report
            .into_iter()
            .next()
            .ok_or(ReportError::EmptyReport { utility: Utility::Lvs })?;
        entry
            .lv
            .into_iter()
            .map(|row| {
                Ok(LogicalVolumeReport {
                    lv_name: row.lv_name,
                    vg_name: row.vg_name,
                    lv_attr: row.lv_attr,
                    lv_size: parse_size("logical volume size", &row.lv_size)?,
                })
            })
            .collect()
    }

    pub fn create_physical_volume(
        executor: &BoxedExecutor,
        device: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::PvCreate.command(&[device]);
        executor.execute(&mut command)?;
        Ok(())
    }

    pub fn create_volume_group(
        executor: &BoxedExecutor,
        name: &str,
        physical_volume: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::VgCreate.command(&[name, physical_volume]);
        executor.execute(&mut command)?;
        Ok(())
    }

    /// Creates a logical volume sized as a percentage of its volume group
    /// (`lvcreate -l <pct>%VG -n <name> <vg>`).
    pub fn create_logical_volume(
        executor: &BoxedExecutor,
        name: &str,
        volume_group: &str,
        vg_percent: u64,
    ) -> Result<(), crate::ExecutionError> {
        let percent = format!("{vg_percent}%VG");
        let mut command = Utility::LvCreate
            .command(&["-l", &percent, "-n", name, volume_group]);
        executor.execute(&mut command)?;
        Ok(())
    }

    pub fn activate_logical_volume(
        executor: &BoxedExecutor,
        name: &str,
        volume_group: &str,
    ) -> Result<(), crate::ExecutionError> {
        let target = format!("{volume_group}/{name}");
        let mut command = Utility::LvChange.command(&["-ay", &target]);
        executor.execute(&mut command)?;
        Ok(())
    }

    pub fn resize_physical_volume(
        executor: &BoxedExecutor,
        name: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::PvResize.command(&[name]);
        executor.execute(&mut command)?;
        Ok(())
    }

    /// Extends a logical volume to a percentage of its volume group
    /// (`lvextend -l <pct>%VG <vg>/<lv>`).
    pub fn resize_logical_volume(
        executor: &BoxedExecutor,
        name: &str,
        volume_group: &str,
        vg_percent: u64,
    ) -> Result<(), crate::ExecutionError> {
        let percent = format!("{vg_percent}%VG");
        let target = format!("{volume_group}/{name}");
        let mut command =
            Utility::LvExtend.command(&["-l", &percent, &target]);
        executor.execute(&mut command)?;
        Ok(())
    }
}
