// Copyright 2026 Journeytrace (https://github.com/journeytrace)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Repeated-lookup index over a finished flow tree.
//!
//! The tree owns its children strictly top-down and carries no parent
//! pointers, so "find the parent of node X" and "find step N" are answered
//! by tables built once per tree. Paths are child-index chains from the
//! root; the index holds no references into the tree and can be stored
//! alongside it.

use std::collections::HashMap;

use journeytrace_core::{FlowNode, FlowNodeKind};

/// Lookup tables for one flow tree.
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    paths: HashMap<String, Vec<usize>>,
    parents: HashMap<String, String>,
    step_ids: Vec<String>,
    step_positions: HashMap<String, usize>,
}

impl NodeIndex {
    /// Walk the tree once, recording every node's path and parent and the
    /// tree-order position of every step.
    pub fn build(root: &FlowNode) -> Self {
        let mut index = NodeIndex::default();
        let mut path = Vec::new();
        index.walk(root, &mut path, None);
        index
    }

    fn walk(&mut self, node: &FlowNode, path: &mut Vec<usize>, parent: Option<&str>) {
        self.paths.insert(node.id.clone(), path.clone());
        if let Some(parent_id) = parent {
            self.parents.insert(node.id.clone(), parent_id.to_string());
        }
        if matches!(node.kind, FlowNodeKind::Step(_)) {
            self.step_positions.insert(node.id.clone(), self.step_ids.len());
            self.step_ids.push(node.id.clone());
        }
        for (position, child) in node.children.iter().enumerate() {
            path.push(position);
            self.walk(child, path, Some(&node.id));
            path.pop();
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.paths.contains_key(node_id)
    }

    /// Child-index path from the root to a node.
    pub fn path(&self, node_id: &str) -> Option<&[usize]> {
        self.paths.get(node_id).map(Vec::as_slice)
    }

    /// Parent id of a node; `None` for the root or an unknown id.
    pub fn parent_id(&self, node_id: &str) -> Option<&str> {
        self.parents.get(node_id).map(String::as_str)
    }

    /// Resolve a node by id against the tree this index was built from.
    pub fn node<'a>(&self, root: &'a FlowNode, node_id: &str) -> Option<&'a FlowNode> {
        root.node_at(self.path(node_id)?)
    }

    pub fn parent<'a>(&self, root: &'a FlowNode, node_id: &str) -> Option<&'a FlowNode> {
        self.node(root, self.parent_id(node_id)?)
    }

    /// Step node ids in tree order.
    pub fn step_ids(&self) -> &[String] {
        &self.step_ids
    }

    pub fn step_count(&self) -> usize {
        self.step_ids.len()
    }

    /// Tree-order position of a step node; `None` for non-step ids.
    pub fn step_position(&self, node_id: &str) -> Option<usize> {
        self.step_positions.get(node_id).copied()
    }

    pub fn step_by_position<'a>(&self, root: &'a FlowNode, position: usize) -> Option<&'a FlowNode> {
        self.node(root, self.step_ids.get(position)?)
    }

    pub fn previous_step<'a>(&self, root: &'a FlowNode, step_id: &str) -> Option<&'a FlowNode> {
        let position = self.step_position(step_id)?;
        self.step_by_position(root, position.checked_sub(1)?)
    }

    pub fn next_step<'a>(&self, root: &'a FlowNode, step_id: &str) -> Option<&'a FlowNode> {
        let position = self.step_position(step_id)?;
        self.step_by_position(root, position + 1)
    }

    /// Find an entity node by its engine-side id anywhere under a step,
    /// display-control nesting included.
    pub fn find_child<'a>(
        &self,
        root: &'a FlowNode,
        step_id: &str,
        entity_id: &str,
    ) -> Option<&'a FlowNode> {
        self.step_position(step_id)?;
        find_descendant(self.node(root, step_id)?, entity_id)
    }
}

/// The engine-side id an entity node is addressed by, if it has one.
fn entity_id(kind: &FlowNodeKind) -> Option<&str> {
    match kind {
        FlowNodeKind::TechnicalProfile(profile) => Some(&profile.id),
        FlowNodeKind::ClaimsTransformation(transformation) => Some(&transformation.id),
        FlowNodeKind::DisplayControl(control) => Some(&control.id),
        FlowNodeKind::SendClaims { technical_profile_id } => technical_profile_id.as_deref(),
        FlowNodeKind::HomeRealmDiscovery { selected, .. } => selected.as_deref(),
        FlowNodeKind::Root { .. } | FlowNodeKind::SubJourney { .. } | FlowNodeKind::Step(_) => None,
    }
}

fn find_descendant<'a>(node: &'a FlowNode, needle: &str) -> Option<&'a FlowNode> {
    for child in &node.children {
        if entity_id(&child.kind) == Some(needle) {
            return Some(child);
        }
        if let Some(found) = find_descendant(child, needle) {
            return Some(found);
        }
    }
    None
}
