// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A typed multi-level graph of the LVM topology:
//! Device -> PhysicalVolume -> VolumeGroup -> LogicalVolume.
//!
//! Nodes live in a map keyed by a composite id and reference each other by
//! id, so the bidirectional parent/child edges never form an ownership
//! cycle. Traversal filters on the node-state bitmask, which encodes both
//! kind and liveness.

use crate::model::{LvmKind, LvmState};
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LvmGraphError {
    #[error("{0}: Device already exists")]
    DeviceExists(String),

    #[error("{0}: Physical volume already exists")]
    PhysicalVolumeExists(String),

    #[error("{name}/{volume_group}: Logical volume already exists")]
    LogicalVolumeExists { name: String, volume_group: String },

    #[error("{pv}: Physical volume is already assigned to volume group {vg}")]
    PhysicalVolumeAssigned { pv: String, vg: String },

    #[error("{0}: Block device does not exist")]
    DeviceNotFound(String),

    #[error("{0}: Physical volume does not exist")]
    PhysicalVolumeNotFound(String),

    #[error("{0}: Volume group does not exist")]
    VolumeGroupNotFound(String),

    #[error("{volume_group}/{name}: Logical volume does not exist")]
    LogicalVolumeNotFound { name: String, volume_group: String },
}

/// A node of the graph. Edges are held as composite ids into the owning
/// graph's node map.
#[derive(Debug, Clone)]
pub struct LvmNode {
    pub name: String,
    pub state: LvmState,
    pub size: u64,
    children: Vec<String>,
    parents: Vec<String>,
}

impl LvmNode {
    fn new(name: String, state: LvmState, size: u64) -> Self {
        Self { name, state, size, children: vec![], parents: vec![] }
    }
}

fn device_id(name: &str) -> String {
    format!("device:{name}")
}

fn physical_volume_id(name: &str) -> String {
    format!("pv:{name}")
}

fn volume_group_id(name: &str) -> String {
    format!("vg:{name}")
}

// Logical volume names are only unique within their group.
fn logical_volume_id(name: &str, volume_group: &str) -> String {
    format!("lv:{name}:vg:{volume_group}")
}

#[derive(Debug, Default)]
pub struct LvmGraph {
    nodes: BTreeMap<String, LvmNode>,
}

impl LvmGraph {
    pub fn new() -> Self {
        Self { nodes: BTreeMap::new() }
    }

    pub fn add_device(
        &mut self,
        name: &str,
        size: u64,
    ) -> Result<(), LvmGraphError> {
        let id = device_id(name);
        if self.nodes.contains_key(&id) {
            return Err(LvmGraphError::DeviceExists(name.to_string()));
        }
        self.nodes.insert(
            id,
            LvmNode::new(name.to_string(), LvmState::DeviceActive, size),
        );
        Ok(())
    }

    /// A physical volume attaches to exactly one device, which must already
    /// be present.
    pub fn add_physical_volume(
        &mut self,
        name: &str,
        size: u64,
    ) -> Result<(), LvmGraphError> {
        let id = physical_volume_id(name);
        if self.nodes.contains_key(&id) {
            return Err(LvmGraphError::PhysicalVolumeExists(name.to_string()));
        }
        let did = device_id(name);
        if !self.nodes.contains_key(&did) {
            return Err(LvmGraphError::DeviceNotFound(name.to_string()));
        }
        self.nodes.insert(
            id.clone(),
            LvmNode::new(
                name.to_string(),
                LvmState::PhysicalVolumeActive,
                size,
            ),
        );
        self.nodes.get_mut(&did).unwrap().children.push(id.clone());
        self.nodes.get_mut(&id).unwrap().parents.push(did);
        Ok(())
    }

    /// Attaches a volume group to a physical volume. The node is created on
    /// first sight and re-used on subsequent insertions, so a group
    /// observed spanning several physical volumes accumulates one parent
    /// per insertion; a physical volume, however, may bear only one group.
    pub fn add_volume_group(
        &mut self,
        name: &str,
        physical_volume: &str,
        size: u64,
    ) -> Result<(), LvmGraphError> {
        let id = volume_group_id(name);
        let pvid = physical_volume_id(physical_volume);
        let Some(pv) = self.nodes.get(&pvid) else {
            return Err(LvmGraphError::PhysicalVolumeNotFound(
                physical_volume.to_string(),
            ));
        };
        if let Some(child) = pv.children.first() {
            return Err(LvmGraphError::PhysicalVolumeAssigned {
                pv: physical_volume.to_string(),
                vg: self.nodes[child].name.clone(),
            });
        }
        if !self.nodes.contains_key(&id) {
            self.nodes.insert(
                id.clone(),
                LvmNode::new(
                    name.to_string(),
                    LvmState::VolumeGroupInactive,
                    size,
                ),
            );
        }
        self.nodes.get_mut(&pvid).unwrap().children.push(id.clone());
        self.nodes.get_mut(&id).unwrap().parents.push(pvid);
        Ok(())
    }

    /// Attaches a logical volume to its group. The group's aggregate state
    /// flips to active as soon as one active child is seen.
    pub fn add_logical_volume(
        &mut self,
        name: &str,
        volume_group: &str,
        state: LvmState,
        size: u64,
    ) -> Result<(), LvmGraphError> {
        let id = logical_volume_id(name, volume_group);
        if self.nodes.contains_key(&id) {
            return Err(LvmGraphError::LogicalVolumeExists {
                name: name.to_string(),
                volume_group: volume_group.to_string(),
            });
        }
        let vgid = volume_group_id(volume_group);
        if !self.nodes.contains_key(&vgid) {
            return Err(LvmGraphError::VolumeGroupNotFound(
                volume_group.to_string(),
            ));
        }
        self.nodes.insert(
            id.clone(),
            LvmNode::new(name.to_string(), state, size),
        );
        let vg = self.nodes.get_mut(&vgid).unwrap();
        vg.children.push(id.clone());
        if state == LvmState::LogicalVolumeActive {
            vg.state = LvmState::VolumeGroupActive;
        }
        self.nodes.get_mut(&id).unwrap().parents.push(vgid);
        Ok(())
    }

    pub fn get_device(&self, name: &str) -> Result<&LvmNode, LvmGraphError> {
        self.nodes
            .get(&device_id(name))
            .ok_or_else(|| LvmGraphError::DeviceNotFound(name.to_string()))
    }

    pub fn get_physical_volume(
        &self,
        name: &str,
    ) -> Result<&LvmNode, LvmGraphError> {
        self.nodes.get(&physical_volume_id(name)).ok_or_else(|| {
            LvmGraphError::PhysicalVolumeNotFound(name.to_string())
        })
    }

    pub fn get_volume_group(
        &self,
        name: &str,
    ) -> Result<&LvmNode, LvmGraphError> {
        self.nodes
            .get(&volume_group_id(name))
            .ok_or_else(|| LvmGraphError::VolumeGroupNotFound(name.to_string()))
    }

    pub fn get_logical_volume(
        &self,
        name: &str,
        volume_group: &str,
    ) -> Result<&LvmNode, LvmGraphError> {
        self.nodes.get(&logical_volume_id(name, volume_group)).ok_or_else(
            || LvmGraphError::LogicalVolumeNotFound {
                name: name.to_string(),
                volume_group: volume_group.to_string(),
            },
        )
    }

    /// Parents of a node whose state falls inside the kind's bitmask.
    pub fn get_parents(&self, node: &LvmNode, kind: LvmKind) -> Vec<&LvmNode> {
        node.parents
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|parent| parent.state.is_kind(kind))
            .collect()
    }

    /// Children of a node whose state falls inside the kind's bitmask.
    pub fn get_children(&self, node: &LvmNode, kind: LvmKind) -> Vec<&LvmNode> {
        node.children
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|child| child.state.is_kind(kind))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn chain() -> LvmGraph {
        let mut graph = LvmGraph::new();
        graph.add_device("/dev/xvdf", 1073741824).unwrap();
        graph.add_physical_volume("/dev/xvdf", 1069547520).unwrap();
        graph.add_volume_group("data", "/dev/xvdf", 1069547520).unwrap();
        graph
            .add_logical_volume(
                "data",
                "data",
                LvmState::LogicalVolumeInactive,
                855613440,
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_chain_traversal() {
        let graph = chain();
        let lv = graph.get_logical_volume("data", "data").unwrap();
        let vgs = graph.get_parents(lv, LvmKind::VolumeGroup);
        assert_eq!(vgs.len(), 1);
        assert_eq!(vgs[0].name, "data");
        let pvs = graph.get_parents(vgs[0], LvmKind::PhysicalVolume);
        assert_eq!(pvs.len(), 1);
        assert_eq!(pvs[0].name, "/dev/xvdf");
        let devices = graph.get_parents(pvs[0], LvmKind::Device);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].size, 1073741824);
    }

    #[test]
    fn test_duplicate_insertions_rejected() {
        let mut graph = chain();
        assert_eq!(
            graph.add_device("/dev/xvdf", 1).unwrap_err(),
            LvmGraphError::DeviceExists("/dev/xvdf".to_string())
        );
        assert_eq!(
            graph.add_physical_volume("/dev/xvdf", 1).unwrap_err(),
            LvmGraphError::PhysicalVolumeExists("/dev/xvdf".to_string())
        );
        assert_eq!(
            graph
                .add_logical_volume(
                    "data",
                    "data",
                    LvmState::LogicalVolumeActive,
                    1
                )
                .unwrap_err(),
            LvmGraphError::LogicalVolumeExists {
                name: "data".to_string(),
                volume_group: "data".to_string(),
            }
        );
    }

    #[test]
    fn test_physical_volume_requires_device() {
        let mut graph = LvmGraph::new();
        assert_eq!(
            graph.add_physical_volume("/dev/xvdf", 1).unwrap_err(),
            LvmGraphError::DeviceNotFound("/dev/xvdf".to_string())
        );
    }

    #[test]
    fn test_physical_volume_bears_one_group() {
        let mut graph = chain();
        assert_eq!(
            graph.add_volume_group("other", "/dev/xvdf", 1).unwrap_err(),
            LvmGraphError::PhysicalVolumeAssigned {
                pv: "/dev/xvdf".to_string(),
                vg: "data".to_string(),
            }
        );
    }

    #[test]
    fn test_spanned_volume_group_accumulates_parents() {
        let mut graph = LvmGraph::new();
        graph.add_device("/dev/xvdf", 100).unwrap();
        graph.add_device("/dev/xvdg", 100).unwrap();
        graph.add_physical_volume("/dev/xvdf", 90).unwrap();
        graph.add_physical_volume("/dev/xvdg", 90).unwrap();
        graph.add_volume_group("data", "/dev/xvdf", 180).unwrap();
        graph.add_volume_group("data", "/dev/xvdg", 180).unwrap();

        let vg = graph.get_volume_group("data").unwrap();
        let pvs = graph.get_parents(vg, LvmKind::PhysicalVolume);
        assert_eq!(pvs.len(), 2);
    }

    #[test]
    fn test_active_logical_volume_activates_group() {
        let mut graph = LvmGraph::new();
        graph.add_device("/dev/xvdf", 100).unwrap();
        graph.add_physical_volume("/dev/xvdf", 90).unwrap();
        graph.add_volume_group("data", "/dev/xvdf", 90).unwrap();
        assert_eq!(
            graph.get_volume_group("data").unwrap().state,
            LvmState::VolumeGroupInactive
        );
        graph
            .add_logical_volume(
                "data",
                "data",
                LvmState::LogicalVolumeActive,
                45,
            )
            .unwrap();
        assert_eq!(
            graph.get_volume_group("data").unwrap().state,
            LvmState::VolumeGroupActive
        );
    }

    #[test]
    fn test_logical_volume_requires_group() {
        let mut graph = LvmGraph::new();
        assert_eq!(
            graph
                .add_logical_volume(
                    "data",
                    "data",
                    LvmState::LogicalVolumeActive,
                    1
                )
                .unwrap_err(),
            LvmGraphError::VolumeGroupNotFound("data".to_string())
        );
    }

    #[test]
    fn test_state_filtered_traversal() {
        let graph = chain();
        let vg = graph.get_volume_group("data").unwrap();
        // Filtering on the wrong kind returns nothing.
        assert!(graph.get_children(vg, LvmKind::PhysicalVolume).is_empty());
        assert_eq!(graph.get_children(vg, LvmKind::LogicalVolume).len(), 1);
    }
}
