// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Per-device safety gate for action execution.
///
/// `Empty` is the uninitialised state carried by an action before its layer
/// attaches a resolved mode; it is never a valid mode to execute under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Empty,
    Healthcheck,
    Prompt,
    Force,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Mode '{0}' is not supported")]
pub struct ParseModeError(pub String);

impl Mode {
    pub fn parse(s: &str) -> Result<Self, ParseModeError> {
        match s {
            "" => Ok(Mode::Empty),
            "healthcheck" => Ok(Mode::Healthcheck),
            "prompt" => Ok(Mode::Prompt),
            "force" => Ok(Mode::Force),
            other => Err(ParseModeError(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Empty => "",
            Mode::Healthcheck => "healthcheck",
            Mode::Prompt => "prompt",
            Mode::Force => "force",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Mode::parse(&s).map_err(D::Error::custom)
    }
}
