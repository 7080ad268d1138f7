// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::model::FileSystem;
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::fmt;

/// A probed block device.
///
/// `name` is the caller-supplied path, which is authoritative even when it
/// differs from the kernel's internal name (e.g. a `/dev/sd*` alias for an
/// NVMe namespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub name: String,
    pub mount_point: Option<Utf8PathBuf>,
    pub file_system: FileSystem,
    pub label: Option<String>,
}

/// A comma-joined mount option sequence, e.g. `defaults,nofail`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MountOptions(String);

impl MountOptions {
    pub fn new<S: Into<String>>(options: S) -> Self {
        Self(options.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The same sequence with `remount` appended, unless already present.
    pub fn remount(&self) -> MountOptions {
        let mut tokens: Vec<&str> = if self.0.is_empty() {
            Vec::new()
        } else {
            self.0.split(',').collect()
        };
        if !tokens.contains(&"remount") {
            tokens.push("remount");
        }
        MountOptions(tokens.join(","))
    }
}

impl fmt::Display for MountOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MountOptions {
    fn from(options: &str) -> Self {
        Self(options.to_string())
    }
}

/// Byte sizes of a block device and the filesystem it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDeviceMetrics {
    pub file_system_size: u64,
    pub block_device_size: u64,
}

impl BlockDeviceMetrics {
    /// Whether the filesystem has fallen below `threshold_pct` percent of
    /// its device. A threshold of zero requests a resize unconditionally;
    /// the resize utilities themselves are idempotent.
    pub fn should_resize(&self, threshold_pct: f64) -> bool {
        if threshold_pct == 0.0 {
            return true;
        }
        (self.file_system_size as f64) * 100.0
            < (self.block_device_size as f64) * threshold_pct
    }
}
