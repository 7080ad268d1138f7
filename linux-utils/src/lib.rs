// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wrappers around the Linux block-storage utilities.
//!
//! Every interaction with the host goes through the [`process::Executor`]
//! seam so tests can substitute canned responses for real utility output.

pub mod blockdev;
pub mod e2fs;
pub mod lsblk;
pub mod lvm;
pub mod mount;
pub mod nvme;
pub mod process;
pub mod utility;
pub mod xfs;

pub use process::BoxedExecutor;
pub use process::ExecutionError;
pub use utility::Utility;
