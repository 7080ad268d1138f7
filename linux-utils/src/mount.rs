// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for attaching and detaching filesystems (`mount`, `umount`).

use crate::process::BoxedExecutor;
use crate::utility::Utility;

/// Wraps the `mount` and `umount` commands.
pub struct Mounts {}

impl Mounts {
    /// Mounts `source` at `target` with an explicit filesystem type and a
    /// comma-joined option string.
    pub fn mount(
        executor: &BoxedExecutor,
        source: &str,
        target: &str,
        fstype: &str,
        options: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command =
            Utility::Mount.command(&[source, "-t", fstype, "-o", options, target]);
        executor.execute(&mut command)?;
        Ok(())
    }

    /// Unmounts whatever is mounted at `target`.
    pub fn umount(
        executor: &BoxedExecutor,
        target: &str,
    ) -> Result<(), crate::ExecutionError> {
        let mut command = Utility::Umount.command(&[target]);
        executor.execute(&mut command)?;
        Ok(())
    }
}
