// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for managing xfs filesystems (`mkfs.xfs`, `xfs_admin`,
//! `xfs_info`, `xfs_growfs`).

use crate::process::{stdout_string, BoxedExecutor};
use crate::utility::Utility;
use regex::Regex;

/// Error returned by [`Xfs::get_size_bytes`].
#[derive(thiserror::Error, Debug)]
pub enum GetSizeError {
    #[error(transparent)]
    Execution(#[from] crate::ExecutionError),

    #[error("{device}: Block size and block count not found in xfs_info output")]
    GeometryNotFound { device: String },

    #[error("Failed to cast {what} to unsigned 64-bit integer")]
    Parse { what: &'static str, source: std::num::ParseIntError },
}

/// Wraps commands for interacting with xfs filesystems.
pub struct Xfs {}

impl Xfs {
    /// Formats the device with a fresh xfs filesystem.
    pub fn format(
        executor: &BoxedExecutor,
        device: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::MkfsXfs.command(&[device]);
        executor.execute(&mut command)?;
        Ok(())
    }

    /// Applies a label via `xfs_admin -L`. The filesystem must be unmounted;
    /// callers are expected to sequence an unmount first.
    pub fn set_label(
        executor: &BoxedExecutor,
        device: &str,
        label: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::XfsAdmin.command(&["-L", label, device]);
        executor.execute(&mut command)?;
        Ok(())
    }

    /// Grows the filesystem to fill its device. xfs grows through the mount
    /// point, so `target` is a mounted path rather than a device node.
    pub fn grow(
        executor: &BoxedExecutor,
        target: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::XfsGrowfs.command(&[target]);
        executor.execute(&mut command)?;
        Ok(())
    }

    /// Filesystem size in bytes, computed from the data section of
    /// `xfs_info` (`data = bsize=<n> blocks=<n>`).
    pub fn get_size_bytes(
        executor: &BoxedExecutor,
        device: &str,
    ) -> Result<u64, GetSizeError> {
        let mut command = Utility::XfsInfo.command(&[device]);
        let output = executor.execute(&mut command)?;
        let stdout = stdout_string(&output);

        let data_re = Regex::new(r"data\s+=\s+bsize=(\d+)\s+blocks=(\d+)").unwrap();
        let captures = data_re.captures(&stdout).ok_or_else(|| {
            GetSizeError::GeometryNotFound { device: device.to_string() }
        })?;
        let block_size = captures[1].parse::<u64>().map_err(|source| {
            GetSizeError::Parse { what: "block size", source }
        })?;
        let block_count = captures[2].parse::<u64>().map_err(|source| {
            GetSizeError::Parse { what: "block count", source }
        })?;
        Ok(block_size * block_count)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::process::{FakeExecutor, Input, Output, OutputExt, StaticHandler};
    use slog::{o, Logger};

    fn test_log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    const XFS_INFO_OUTPUT: &str = "\
meta-data=/dev/xvdf              isize=512    agcount=4, agsize=65536 blks
         =                       sectsz=512   attr=2, projid32bit=1
data     =                       bsize=4096   blocks=262144, imaxpct=25
         =                       sunit=0      swidth=0 blks
naming   =version 2              bsize=4096   ascii-ci=0, ftype=1
";

    #[test]
    fn test_get_size_bytes() {
        let executor = FakeExecutor::new(test_log());
        let mut handler = StaticHandler::new();
        handler.expect(
            Input::shell("xfs_info /dev/xvdf"),
            Output::success().set_stdout(XFS_INFO_OUTPUT),
        );
        executor.set_static_handler(handler);

        let size =
            Xfs::get_size_bytes(&executor.as_executor(), "/dev/xvdf").unwrap();
        assert_eq!(size, 4096 * 262144);
    }

    #[test]
    fn test_get_size_bytes_geometry_missing() {
        let executor = FakeExecutor::new(test_log());
        let mut handler = StaticHandler::new();
        handler.expect(
            Input::shell("xfs_info /dev/xvdf"),
            Output::success().set_stdout("garbled"),
        );
        executor.set_static_handler(handler);

        let err = Xfs::get_size_bytes(&executor.as_executor(), "/dev/xvdf")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "/dev/xvdf: Block size and block count not found in xfs_info output"
        );
    }

    #[test]
    fn test_label_and_grow_invocations() {
        let executor = FakeExecutor::new(test_log());
        let mut handler = StaticHandler::new();
        handler.expect_ok("mkfs.xfs /dev/xvdf");
        handler.expect_ok("xfs_admin -L stateful /dev/xvdf");
        handler.expect_ok("xfs_growfs /mnt/app");
        executor.set_static_handler(handler);

        let executor = executor.as_executor();
        Xfs::format(&executor, "/dev/xvdf").unwrap();
        Xfs::set_label(&executor, "/dev/xvdf", "stateful").unwrap();
        Xfs::grow(&executor, "/mnt/app").unwrap();
    }
}
