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

//! Flow tree assembly.
//!
//! The builder keeps a cursor on the journey level currently receiving
//! steps: main-journey steps attach directly under the root, a sub-journey
//! push descends into a SubJourney wrapper node, a pop climbs back out.
//! Node ids are allocated from a per-tree counter in attach order, so the
//! same flow always yields the same ids.

use chrono::{DateTime, Utc};

use journeytrace_core::node::{FlowNode, FlowNodeKind, NodeContext};
use journeytrace_core::step::TraceStep;

/// A node prepared by the interpreter before ids exist: the builder assigns
/// ids when it attaches the subtree.
#[derive(Debug, Clone)]
pub struct PendingNode {
    pub kind: FlowNodeKind,
    pub context: NodeContext,
    pub children: Vec<PendingNode>,
}

impl PendingNode {
    pub fn new(kind: FlowNodeKind, context: NodeContext) -> Self {
        Self { kind, context, children: Vec::new() }
    }
}

/// Builds one flow's tree while the interpreter replays it.
#[derive(Debug)]
pub struct FlowTreeBuilder {
    root: FlowNode,
    /// Child-index path to the journey level currently receiving steps.
    cursor: Vec<usize>,
    /// Path of every finalized step node, by step sequence.
    step_paths: Vec<Vec<usize>>,
    next_id: u32,
}

impl FlowTreeBuilder {
    pub fn new(
        journey_id: impl Into<String>,
        journey_name: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let root = FlowNode::new(
            "n0",
            FlowNodeKind::Root {
                journey_id: journey_id.into(),
                journey_name: journey_name.into(),
                last_step: 0,
            },
            NodeContext::new(started_at, 0),
        );
        Self { root, cursor: Vec::new(), step_paths: Vec::new(), next_id: 1 }
    }

    fn alloc_id(&mut self) -> String {
        let id = format!("n{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Nesting depth of the cursor; zero at the root level.
    pub fn depth(&self) -> usize {
        self.cursor.len()
    }

    fn current_level_mut(&mut self) -> &mut FlowNode {
        let mut node = &mut self.root;
        for &index in &self.cursor {
            // Cursor indices always point at children this builder attached;
            // children are only ever appended, never removed.
            node = &mut node.children[index];
        }
        node
    }

    /// Enter a sub-journey: attach a wrapper node under the current level
    /// and move the cursor into it.
    pub fn push_sub_journey(
        &mut self,
        journey_id: impl Into<String>,
        journey_name: impl Into<String>,
        context: NodeContext,
    ) {
        let id = self.alloc_id();
        let node = FlowNode::new(
            id,
            FlowNodeKind::SubJourney {
                journey_id: journey_id.into(),
                journey_name: journey_name.into(),
                last_step: 0,
            },
            context,
        );
        let index = self.current_level_mut().push_child(node);
        self.cursor.push(index);
    }

    /// Leave the current sub-journey. Returns `false` when already at the
    /// root level (the clamp case — the cursor does not move).
    pub fn pop_sub_journey(&mut self) -> bool {
        self.cursor.pop().is_some()
    }

    /// Attach a finalized step, with its entity children, under the current
    /// level. Journey nodes along the cursor path get their step high-water
    /// marks raised.
    pub fn add_step(&mut self, step: TraceStep, context: NodeContext, children: Vec<PendingNode>) {
        let order = step.order;
        let id = self.alloc_id();
        let mut node = FlowNode::new(id, FlowNodeKind::Step(Box::new(step)), context);
        for child in children {
            let built = self.build_pending(child);
            node.push_child(built);
        }

        for prefix_len in 0..=self.cursor.len() {
            let path = self.cursor[..prefix_len].to_vec();
            if let Some(level) = self.root.node_at_mut(&path) {
                level.bump_last_step(order);
            }
        }

        let level = self.current_level_mut();
        let index = level.push_child(node);
        let mut path = self.cursor.clone();
        path.push(index);
        self.step_paths.push(path);
    }

    fn build_pending(&mut self, pending: PendingNode) -> FlowNode {
        let id = self.alloc_id();
        let mut node = FlowNode::new(id, pending.kind, pending.context);
        for child in pending.children {
            let built = self.build_pending(child);
            node.push_child(built);
        }
        node
    }

    /// Retro-write a late-arriving HRD selection onto an already-attached
    /// step node. The only post-finalization mutation the tree admits.
    pub fn set_step_selected_option(&mut self, step_sequence: usize, option: &str) -> bool {
        let Some(path) = self.step_paths.get(step_sequence).cloned() else {
            return false;
        };
        let Some(node) = self.root.node_at_mut(&path) else {
            return false;
        };
        if let Some(step) = node.step_mut() {
            step.selected_option = Some(option.to_string());
        }
        for child in &mut node.children {
            if let FlowNodeKind::HomeRealmDiscovery { selected, .. } = &mut child.kind {
                if selected.is_none() {
                    *selected = Some(option.to_string());
                }
            }
        }
        true
    }

    pub fn finish(self) -> FlowNode {
        self.root
    }
}
