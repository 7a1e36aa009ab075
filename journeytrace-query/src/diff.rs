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

//! Claims-state diffing.
//!
//! [`compute_claims_diff`] is a pure set difference over two claims
//! snapshots. [`before_claims`] resolves which snapshot a given tree node
//! diffs against: entity nodes snapshot the accumulator mid-step, so "what
//! did this technical profile change" is answered by diffing its context
//! against the context of whatever ran just before it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use journeytrace_core::{FlowNode, FlowNodeKind};
use journeytrace_replay::FlowTrace;

use crate::navigate::NodeIndex;

/// One claim whose value changed between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimChange {
    pub old: String,
    pub new: String,
}

/// Key-level difference between two claims snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsDiff {
    /// Present only in the later snapshot.
    pub added: BTreeMap<String, String>,
    /// Present in both with differing values.
    pub modified: BTreeMap<String, ClaimChange>,
    /// Present only in the earlier snapshot, sorted.
    pub removed: Vec<String>,
}

impl ClaimsDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Diff two claims snapshots key by key. Pure, linear in the combined key
/// count.
pub fn compute_claims_diff(
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
) -> ClaimsDiff {
    let mut diff = ClaimsDiff::default();
    for (key, value) in after {
        match before.get(key) {
            None => {
                diff.added.insert(key.clone(), value.clone());
            }
            Some(old) if old != value => {
                diff.modified
                    .insert(key.clone(), ClaimChange { old: old.clone(), new: value.clone() });
            }
            Some(_) => {}
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            diff.removed.push(key.clone());
        }
    }
    diff
}

/// Resolve the snapshot a node diffs against.
///
/// A technical profile diffs against the previous technical profile observed
/// under the same parent, or the owning step's predecessor when it is first;
/// a transformation against its owning technical profile (nearest preceding
/// sibling profile, else the step rule); step, HRD, display-control and
/// send-claims nodes against the immediately preceding step; the first step
/// and the root against the empty snapshot. Returns `None` for an unknown
/// node id.
pub fn before_claims(
    trace: &FlowTrace,
    index: &NodeIndex,
    node_id: &str,
) -> Option<BTreeMap<String, String>> {
    let root = &trace.tree;
    let node = index.node(root, node_id)?;
    let claims = match &node.kind {
        FlowNodeKind::Root { .. } => BTreeMap::new(),
        FlowNodeKind::Step(_) => preceding_step_claims(root, index, node_id),
        FlowNodeKind::SubJourney { .. } => {
            last_step_claims_before(root, index, index.path(node_id)?)
        }
        FlowNodeKind::TechnicalProfile(_) | FlowNodeKind::ClaimsTransformation(_) => {
            match preceding_profile_claims(root, index, node_id) {
                Some(claims) => claims,
                None => owning_step_before(root, index, node_id),
            }
        }
        FlowNodeKind::HomeRealmDiscovery { .. }
        | FlowNodeKind::DisplayControl(_)
        | FlowNodeKind::SendClaims { .. } => owning_step_before(root, index, node_id),
    };
    Some(claims)
}

/// Claims at the end of the step immediately before this one in tree order;
/// empty for the first step.
fn preceding_step_claims(
    root: &FlowNode,
    index: &NodeIndex,
    step_id: &str,
) -> BTreeMap<String, String> {
    index
        .previous_step(root, step_id)
        .and_then(FlowNode::step)
        .map(|step| step.claims.clone())
        .unwrap_or_default()
}

/// Claims of the last step finalized before `path` in tree order.
fn last_step_claims_before(
    root: &FlowNode,
    index: &NodeIndex,
    path: &[usize],
) -> BTreeMap<String, String> {
    let mut claims = BTreeMap::new();
    for step_id in index.step_ids() {
        match index.path(step_id) {
            Some(step_path) if step_path < path => {
                if let Some(step) = index.node(root, step_id).and_then(FlowNode::step) {
                    claims = step.claims.clone();
                }
            }
            // Step paths ascend in tree order, so the first path at or past
            // the target ends the scan.
            _ => break,
        }
    }
    claims
}

/// Context claims of the nearest preceding sibling technical profile.
fn preceding_profile_claims(
    root: &FlowNode,
    index: &NodeIndex,
    node_id: &str,
) -> Option<BTreeMap<String, String>> {
    let path = index.path(node_id)?;
    let (own_position, parent_path) = path.split_last()?;
    let parent = root.node_at(parent_path)?;
    parent.children[..*own_position]
        .iter()
        .rev()
        .find(|sibling| matches!(sibling.kind, FlowNodeKind::TechnicalProfile(_)))
        .map(|sibling| sibling.context.claims.clone())
}

fn owning_step_before(
    root: &FlowNode,
    index: &NodeIndex,
    node_id: &str,
) -> BTreeMap<String, String> {
    match owning_step_id(index, node_id) {
        Some(step_id) => preceding_step_claims(root, index, &step_id),
        None => BTreeMap::new(),
    }
}

/// Nearest ancestor of a node that is a step.
fn owning_step_id(index: &NodeIndex, node_id: &str) -> Option<String> {
    let mut current = index.parent_id(node_id);
    while let Some(id) = current {
        if index.step_position(id).is_some() {
            return Some(id.to_string());
        }
        current = index.parent_id(id);
    }
    None
}
