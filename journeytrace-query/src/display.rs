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

//! Flat projection of a flow tree for a collapsible display.

use serde::Serialize;

use journeytrace_core::{FlowNode, FlowNodeKind, StepResult};
use journeytrace_replay::FlowTrace;

/// One row of the rendered journey tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRow {
    pub node_id: String,
    pub depth: usize,
    pub label: String,
    /// The node kind's machine tag, for per-kind styling.
    pub kind: &'static str,
    pub expandable: bool,
    /// Step rows carry their outcome; other rows carry none.
    pub result: Option<StepResult>,
}

/// Flatten a finished trace into display rows, depth-first in tree order.
pub fn journey_tree(trace: &FlowTrace) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    trace.tree.visit(&mut |node, depth| {
        rows.push(TreeRow {
            node_id: node.id.clone(),
            depth,
            label: label_for(node),
            kind: node.kind.tag(),
            expandable: !node.children.is_empty(),
            result: node.step().map(|step| step.result),
        });
    });
    rows
}

fn label_for(node: &FlowNode) -> String {
    match &node.kind {
        FlowNodeKind::Root { journey_name, .. } => journey_name.clone(),
        FlowNodeKind::SubJourney { journey_name, .. } => format!("Sub-journey {journey_name}"),
        FlowNodeKind::Step(step) => match &step.event_instance {
            Some(event) => format!("Step {} [{}]", step.order, event.as_str()),
            None => format!("Step {}", step.order),
        },
        FlowNodeKind::TechnicalProfile(profile) => profile.id.clone(),
        FlowNodeKind::ClaimsTransformation(transformation) => transformation.id.clone(),
        FlowNodeKind::HomeRealmDiscovery { options, selected } => match selected {
            Some(choice) => format!("Provider selection: {choice}"),
            None => format!("Provider selection ({} options)", options.len()),
        },
        FlowNodeKind::DisplayControl(control) => match &control.action {
            Some(action) => format!("{}: {action}", control.id),
            None => control.id.clone(),
        },
        FlowNodeKind::SendClaims { technical_profile_id } => match technical_profile_id {
            Some(issuer) => format!("Send claims ({issuer})"),
            None => "Send claims".to_string(),
        },
    }
}
