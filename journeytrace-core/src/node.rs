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

//! The navigable flow tree.
//!
//! [`FlowNode`] is the single tree node type; [`FlowNodeKind`] is the closed
//! set of things a node can be. Ownership is strict: children live inside
//! their parent, there are no cross-links and no cycles, so the borrow
//! checker enforces the tree shape for free.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::step::{ClaimsTransformation, DisplayControlAction, TechnicalProfile, TraceStep};

/// State captured at the moment a node's subject was observed.
///
/// Entity nodes under a step snapshot the accumulator mid-step; that is what
/// makes intra-step claims diffs answerable after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeContext {
    pub timestamp: DateTime<Utc>,
    /// Flow-wide observation order, monotonically increasing.
    pub sequence: u32,
    pub statebag: BTreeMap<String, Value>,
    pub claims: BTreeMap<String, String>,
}

impl NodeContext {
    pub fn new(timestamp: DateTime<Utc>, sequence: u32) -> Self {
        Self { timestamp, sequence, statebag: BTreeMap::new(), claims: BTreeMap::new() }
    }

    pub fn with_snapshots(
        mut self,
        statebag: BTreeMap<String, Value>,
        claims: BTreeMap<String, String>,
    ) -> Self {
        self.statebag = statebag;
        self.claims = claims;
        self
    }
}

/// What a tree node is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FlowNodeKind {
    /// The root journey context of one flow.
    #[serde(rename_all = "camelCase")]
    Root { journey_id: String, journey_name: String, last_step: u32 },
    /// One sub-journey nesting level.
    #[serde(rename_all = "camelCase")]
    SubJourney { journey_id: String, journey_name: String, last_step: u32 },
    Step(Box<TraceStep>),
    TechnicalProfile(TechnicalProfile),
    ClaimsTransformation(ClaimsTransformation),
    /// An identity-provider choice screen with its candidate list.
    #[serde(rename_all = "camelCase")]
    HomeRealmDiscovery { options: Vec<String>, selected: Option<String> },
    DisplayControl(DisplayControlAction),
    /// Final claims issuance to the relying party.
    #[serde(rename_all = "camelCase")]
    SendClaims { technical_profile_id: Option<String> },
}

impl FlowNodeKind {
    /// Short machine-readable tag, one per variant.
    pub fn tag(&self) -> &'static str {
        match self {
            FlowNodeKind::Root { .. } => "root",
            FlowNodeKind::SubJourney { .. } => "subJourney",
            FlowNodeKind::Step(_) => "step",
            FlowNodeKind::TechnicalProfile(_) => "technicalProfile",
            FlowNodeKind::ClaimsTransformation(_) => "claimsTransformation",
            FlowNodeKind::HomeRealmDiscovery { .. } => "homeRealmDiscovery",
            FlowNodeKind::DisplayControl(_) => "displayControl",
            FlowNodeKind::SendClaims { .. } => "sendClaims",
        }
    }
}

/// One node of the flow tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    /// Deterministic per-tree counter id: `"n0"`, `"n1"`, …
    pub id: String,
    pub kind: FlowNodeKind,
    pub context: NodeContext,
    pub children: Vec<FlowNode>,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, kind: FlowNodeKind, context: NodeContext) -> Self {
        Self { id: id.into(), kind, context, children: Vec::new() }
    }

    /// Append a child, returning its index under this node.
    pub fn push_child(&mut self, child: FlowNode) -> usize {
        self.children.push(child);
        self.children.len() - 1
    }

    /// Follow a child-index path down from this node.
    pub fn node_at(&self, path: &[usize]) -> Option<&FlowNode> {
        let mut node = self;
        for &index in path {
            node = node.children.get(index)?;
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut FlowNode> {
        let mut node = self;
        for &index in path {
            node = node.children.get_mut(index)?;
        }
        Some(node)
    }

    pub fn step(&self) -> Option<&TraceStep> {
        match &self.kind {
            FlowNodeKind::Step(step) => Some(step),
            _ => None,
        }
    }

    pub fn step_mut(&mut self) -> Option<&mut TraceStep> {
        match &mut self.kind {
            FlowNodeKind::Step(step) => Some(step),
            _ => None,
        }
    }

    /// Journey id/name for Root and SubJourney nodes.
    pub fn journey_identity(&self) -> Option<(&str, &str)> {
        match &self.kind {
            FlowNodeKind::Root { journey_id, journey_name, .. }
            | FlowNodeKind::SubJourney { journey_id, journey_name, .. } => {
                Some((journey_id, journey_name))
            }
            _ => None,
        }
    }

    /// Raise a journey node's step high-water mark; no-op on other kinds.
    pub fn bump_last_step(&mut self, step: u32) {
        if let FlowNodeKind::Root { last_step, .. } | FlowNodeKind::SubJourney { last_step, .. } =
            &mut self.kind
        {
            *last_step = (*last_step).max(step);
        }
    }

    /// Depth-first pre-order visit, children in attach order.
    pub fn visit(&self, f: &mut impl FnMut(&FlowNode, usize)) {
        self.visit_at_depth(0, f);
    }

    fn visit_at_depth(&self, depth: usize, f: &mut impl FnMut(&FlowNode, usize)) {
        f(self, depth);
        for child in &self.children {
            child.visit_at_depth(depth + 1, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx(sequence: u32) -> NodeContext {
        NodeContext::new(Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(), sequence)
    }

    fn root() -> FlowNode {
        FlowNode::new(
            "n0",
            FlowNodeKind::Root {
                journey_id: "corr-1-0".to_string(),
                journey_name: "B2C_1A_SignIn".to_string(),
                last_step: 0,
            },
            ctx(0),
        )
    }

    #[test]
    fn test_node_at_follows_index_path() {
        let mut tree = root();
        let mut step = FlowNode::new(
            "n1",
            FlowNodeKind::Step(Box::new(TraceStep::new(0, "log-1", "corr-1-0", "B2C_1A_SignIn", 1))),
            ctx(1),
        );
        step.push_child(FlowNode::new(
            "n2",
            FlowNodeKind::TechnicalProfile(TechnicalProfile::new("SelfAsserted-SignIn")),
            ctx(2),
        ));
        tree.push_child(step);

        assert_eq!(tree.node_at(&[]).unwrap().id, "n0");
        assert_eq!(tree.node_at(&[0]).unwrap().id, "n1");
        assert_eq!(tree.node_at(&[0, 0]).unwrap().id, "n2");
        assert!(tree.node_at(&[1]).is_none());
        assert!(tree.node_at(&[0, 0, 0]).is_none());
    }

    #[test]
    fn test_bump_last_step_is_monotonic() {
        let mut tree = root();
        tree.bump_last_step(3);
        tree.bump_last_step(1);
        match &tree.kind {
            FlowNodeKind::Root { last_step, .. } => assert_eq!(*last_step, 3),
            other => panic!("unexpected kind: {}", other.tag()),
        }

        // Non-journey nodes ignore the bump.
        let mut leaf = FlowNode::new(
            "n9",
            FlowNodeKind::SendClaims { technical_profile_id: None },
            ctx(9),
        );
        leaf.bump_last_step(5);
        assert_eq!(leaf.kind.tag(), "sendClaims");
    }

    #[test]
    fn test_visit_is_preorder() {
        let mut tree = root();
        let mut step = FlowNode::new(
            "n1",
            FlowNodeKind::Step(Box::new(TraceStep::new(0, "log-1", "corr-1-0", "B2C_1A_SignIn", 1))),
            ctx(1),
        );
        step.push_child(FlowNode::new(
            "n2",
            FlowNodeKind::HomeRealmDiscovery { options: vec![], selected: None },
            ctx(2),
        ));
        tree.push_child(step);
        tree.push_child(FlowNode::new(
            "n3",
            FlowNodeKind::SendClaims { technical_profile_id: None },
            ctx(3),
        ));

        let mut seen = Vec::new();
        tree.visit(&mut |node, depth| seen.push((node.id.clone(), depth)));
        assert_eq!(
            seen,
            vec![
                ("n0".to_string(), 0),
                ("n1".to_string(), 1),
                ("n2".to_string(), 2),
                ("n3".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_kind_serde_tagging() {
        let node = FlowNode::new(
            "n0",
            FlowNodeKind::HomeRealmDiscovery {
                options: vec!["Google-OAUTH".to_string()],
                selected: Some("Google-OAUTH".to_string()),
            },
            ctx(0),
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"]["kind"], "homeRealmDiscovery");
        let back: FlowNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
