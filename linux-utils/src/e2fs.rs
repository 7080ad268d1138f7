// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for managing ext4 filesystems (`mkfs.ext4`, `e2label`,
//! `tune2fs`, `resize2fs`).

use crate::process::{stdout_string, BoxedExecutor};
use crate::utility::Utility;
use regex::Regex;

/// Error returned by [`Ext4::get_size_bytes`].
#[derive(thiserror::Error, Debug)]
pub enum GetSizeError {
    #[error(transparent)]
    Execution(#[from] crate::ExecutionError),

    #[error("{device}: Block size not found in tune2fs output")]
    BlockSizeNotFound { device: String },

    #[error("{device}: Block count not found in tune2fs output")]
    BlockCountNotFound { device: String },

    #[error("Failed to cast {what} to unsigned 64-bit integer")]
    Parse { what: &'static str, source: std::num::ParseIntError },
}

/// Wraps commands for interacting with ext4 filesystems.
pub struct Ext4 {}

impl Ext4 {
    /// Formats the device with a fresh ext4 filesystem.
    pub fn format(
        executor: &BoxedExecutor,
        device: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::MkfsExt4.command(&[device]);
        executor.execute(&mut command)?;
        Ok(())
    }

    /// Applies a label via `e2label`. ext4 labels may be changed while the
    /// filesystem is mounted.
    pub fn set_label(
        executor: &BoxedExecutor,
        device: &str,
        label: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::E2Label.command(&[device, label]);
        executor.execute(&mut command)?;
        Ok(())
    }

    /// Grows the filesystem to fill its device.
    pub fn resize(
        executor: &BoxedExecutor,
        target: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::Resize2fs.command(&[target]);
        executor.execute(&mut command)?;
        Ok(())
    }

    /// Filesystem size in bytes, computed from the `Block size` and
    /// `Block count` lines of `tune2fs -l`.
    pub fn get_size_bytes(
        executor: &BoxedExecutor,
        device: &str,
    ) -> Result<u64, GetSizeError> {
        let mut command = Utility::Tune2fs.command(&["-l", device]);
        let output = executor.execute(&mut command)?;
        let stdout = stdout_string(&output);

        let block_size_re = Regex::new(r"Block size:\s+(\d+)").unwrap();
        let block_size = block_size_re
            .captures(&stdout)
            .ok_or_else(|| GetSizeError::BlockSizeNotFound {
                device: device.to_string(),
            })?[1]
            .parse::<u64>()
            .map_err(|source| GetSizeError::Parse {
                what: "block size",
                source,
            })?;

        let block_count_re = Regex::new(r"Block count:\s+(\d+)").unwrap();
        let block_count = block_count_re
            .captures(&stdout)
            .ok_or_else(|| GetSizeError::BlockCountNotFound {
                device: device.to_string(),
            })?[1]
            .parse::<u64>()
            .map_err(|source| GetSizeError::Parse {
                what: "block count",
                source,
            })?;

        Ok(block_size * block_count)
    }
}
