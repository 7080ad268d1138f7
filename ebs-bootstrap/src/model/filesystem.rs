// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A block device's filesystem, as reported by the device probe.
///
/// `Unformatted` corresponds to an empty probe result and is only a valid
/// input to the format operation; `LvmMember` is the signature a physical
/// volume leaves on its backing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSystem {
    #[default]
    Unformatted,
    Ext4,
    Xfs,
    LvmMember,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("File system '{0}' is not supported")]
pub struct ParseFileSystemError(pub String);

impl FileSystem {
    /// Parses the probe's `FSTYPE` column. An absent/empty value means the
    /// device carries no filesystem at all.
    pub fn parse(s: &str) -> Result<Self, ParseFileSystemError> {
        match s {
            "" => Ok(FileSystem::Unformatted),
            "ext4" => Ok(FileSystem::Ext4),
            "xfs" => Ok(FileSystem::Xfs),
            "LVM2_member" => Ok(FileSystem::LvmMember),
            other => Err(ParseFileSystemError(other.to_string())),
        }
    }

    /// The probe-format string; the inverse of [`FileSystem::parse`].
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSystem::Unformatted => "",
            FileSystem::Ext4 => "ext4",
            FileSystem::Xfs => "xfs",
            FileSystem::LvmMember => "LVM2_member",
        }
    }
}

impl fmt::Display for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystem::Unformatted => write!(f, "unformatted"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for FileSystem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileSystem::parse(&s).map_err(D::Error::custom)
    }
}
