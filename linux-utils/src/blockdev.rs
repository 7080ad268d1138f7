// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for querying block-device geometry via `blockdev`.

use crate::process::{stdout_string, BoxedExecutor};
use crate::utility::Utility;

/// Error returned by [`BlockDev::get_size_bytes`].
#[derive(thiserror::Error, Debug)]
pub enum GetSizeError {
    #[error(transparent)]
    Execution(#[from] crate::ExecutionError),

    #[error("Failed to cast block device size to unsigned 64-bit integer")]
    Parse(#[from] std::num::ParseIntError),
}

/// Wraps commands for interacting with `blockdev`.
pub struct BlockDev {}

impl BlockDev {
    /// Size of the device in bytes, per `blockdev --getsize64`.
    pub fn get_size_bytes(
        executor: &BoxedExecutor,
        device: &str,
    ) -> Result<u64, GetSizeError> {
        let mut command = Utility::BlockDev.command(&["--getsize64", device]);
        let output = executor.execute(&mut command)?;
        Ok(stdout_string(&output).trim().parse()?)
    }
}
