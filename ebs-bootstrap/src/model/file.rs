// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use camino::Utf8PathBuf;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Special,
}

/// A stat'ed path. Symbolic links are resolved before the stat, so `path`
/// reflects the target of any link the caller named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub path: Utf8PathBuf,
    pub file_type: FileType,
    pub device_id: u64,
    pub inode_no: u64,
    pub user_id: u32,
    pub group_id: u32,
    pub permissions: FilePermissions,
}

/// Permission bits of a file, in the 0o000..=0o777 range.
///
/// Linux permission bits are conventionally written as octals (0755), and
/// some users write them without the leading zero (755). Both spellings are
/// parsed base-8; setuid/setgid/sticky values above 0o777 are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePermissions(u32);

impl FilePermissions {
    pub fn new(mode: u32) -> Self {
        Self(mode & 0o777)
    }

    pub fn mode(&self) -> u32 {
        self.0
    }

    fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Ok(FilePermissions(0));
        }
        let mode = u32::from_str_radix(s, 8).map_err(|_| {
            format!("invalid permission value. '{s}' must be a valid octal number")
        })?;
        if mode > 0o777 {
            return Err(format!(
                "invalid permission value. '{mode:#o}' exceeds the maximum \
                 allowed value (0777)"
            ));
        }
        Ok(FilePermissions(mode))
    }
}

impl fmt::Display for FilePermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#o}", self.0)
    }
}

impl<'de> Deserialize<'de> for FilePermissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // YAML spells `755` as an integer and `"0755"` as a string; both
        // carry base-8 digits.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Scalar {
            Number(u64),
            Text(String),
        }
        let digits = match Scalar::deserialize(deserializer)? {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s,
        };
        FilePermissions::parse(&digits).map_err(D::Error::custom)
    }
}
