// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The ebs-bootstrap reconciliation engine.
//!
//! A desired-state document describes what the host's block storage should
//! look like; the engine reconciles observed state toward it through an
//! ordered sequence of layers, each of which refreshes its view of the host,
//! plans idempotent actions, executes them under a safety mode, and
//! re-validates with bounded retries.

pub mod action;
pub mod backend;
pub mod config;
pub mod layer;
pub mod model;
pub mod service;

#[cfg(test)]
mod scenario;
