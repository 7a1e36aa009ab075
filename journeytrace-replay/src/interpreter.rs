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

//! Trace interpretation.
//!
//! One forward pass over a flow's clips, replaying the engine's execution:
//! the journey stack resolves nesting, the statebag accumulator replays
//! state, and an in-progress step assembly collects everything observed
//! until the next step boundary freezes it.
//!
//! Ordering rules the pass lives by:
//!
//! - A boundary result's statebag patch belongs to the *incoming* step; the
//!   outgoing step's snapshots are taken before the patch is applied.
//! - A step is finalized before any stack transition it triggers (enqueue
//!   push, silent-return pop, gap pops), so it attaches to the journey
//!   level that owned it while it was open.
//! - Signals observed while no step is open are staged and flushed into the
//!   next step that opens.
//!
//! Malformed payloads never abort the pass: the offending entry is skipped
//! and noted in the flow's error list.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use journeytrace_core::config::ReplayConfig;
use journeytrace_core::error::{Result, TraceError};
use journeytrace_core::flow::UserFlow;
use journeytrace_core::keys;
use journeytrace_core::node::{FlowNode, FlowNodeKind, NodeContext};
use journeytrace_core::record::{Clip, EventInstance, HandlerResultContent, LogRecord};
use journeytrace_core::step::{
    ClaimsTransformation, DisplayControlAction, TechnicalProfile, TraceStep,
};

use crate::grouper::logs_for_flow;
use crate::stack::JourneyStack;
use crate::statebag::StatebagAccumulator;
use crate::tree::{FlowTreeBuilder, PendingNode};

/// Full reconstruction of one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTrace {
    pub flow_id: String,
    pub tree: FlowNode,
    /// Finalized steps, flattened, in execution order.
    pub steps: Vec<TraceStep>,
    pub final_claims: BTreeMap<String, String>,
    pub final_statebag: BTreeMap<String, Value>,
    /// Structural anomalies recovered during interpretation.
    pub errors: Vec<String>,
}

/// An open display-control scope on the in-progress step.
#[derive(Debug)]
struct DisplayScope {
    /// Index of the DisplayControl node among the assembly's children.
    child_index: usize,
    /// Index of the control in the step's `display_controls` list.
    control_index: usize,
    control_id: String,
}

/// The step being assembled, plus staging for signals that arrive while no
/// step is open.
#[derive(Debug)]
struct StepAssembly {
    opened: bool,
    step: TraceStep,
    context: NodeContext,
    children: Vec<PendingNode>,
    scope: Option<DisplayScope>,
    hrd_child: Option<usize>,
    send_claims_child: Option<usize>,
}

impl StepAssembly {
    fn staging(timestamp: DateTime<Utc>) -> Self {
        Self {
            opened: false,
            step: TraceStep::new(0, "", "", "", 0),
            context: NodeContext::new(timestamp, 0),
            children: Vec::new(),
            scope: None,
            hrd_child: None,
            send_claims_child: None,
        }
    }
}

struct Interpreter<'a> {
    flow: &'a UserFlow,
    stack: JourneyStack,
    accumulator: StatebagAccumulator,
    tree: FlowTreeBuilder,
    steps: Vec<TraceStep>,
    errors: Vec<String>,
    assembly: StepAssembly,
    /// Flow-wide observation counter backing `NodeContext::sequence`.
    next_sequence: u32,
    /// Last attributed raw `CTP` value. The engine never clears the key, so
    /// only a change of value counts as a new invocation.
    last_ctp: Option<String>,
    /// Last attributed `TAGE` value, under the same guard.
    last_tage: Option<String>,
    log_id: String,
    timestamp: DateTime<Utc>,
    event_instance: Option<EventInstance>,
}

impl<'a> Interpreter<'a> {
    fn new(flow: &'a UserFlow, root_name: &str, config: &ReplayConfig) -> Self {
        Self {
            flow,
            stack: JourneyStack::new(&flow.id, root_name),
            accumulator: StatebagAccumulator::new(config.claims_filter.clone()),
            tree: FlowTreeBuilder::new(&flow.id, root_name, flow.started_at),
            steps: Vec::new(),
            errors: Vec::new(),
            assembly: StepAssembly::staging(flow.started_at),
            next_sequence: 1,
            last_ctp: None,
            last_tage: None,
            log_id: String::new(),
            timestamp: flow.started_at,
            event_instance: None,
        }
    }

    fn run(mut self, records: &[&LogRecord]) -> FlowTrace {
        for record in records {
            self.log_id = record.id.clone();
            self.timestamp = record.timestamp;
            self.event_instance = record.event_instance().cloned();

            // A handler result attaches to the nearest preceding action or
            // predicate; the pairing does not cross record boundaries.
            let mut handler: Option<&str> = None;
            for clip in &record.clips {
                match clip {
                    Clip::Headers(_) => {}
                    Clip::Action(name) => {
                        self.on_action(name);
                        handler = Some(name);
                    }
                    Clip::Predicate(name) => handler = Some(name),
                    Clip::HandlerResult(result) => self.on_result(handler, result),
                    Clip::Unknown => {}
                }
            }
        }
        self.finish()
    }

    fn report(&mut self, message: String) {
        warn!(flow_id = %self.flow.id, "{message}");
        self.errors.push(message);
    }

    fn alloc_sequence(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Context snapshot at the current observation point, post-patch.
    fn observe_context(&mut self) -> NodeContext {
        let sequence = self.alloc_sequence();
        NodeContext::new(self.timestamp, sequence)
            .with_snapshots(self.accumulator.statebag_snapshot(), self.accumulator.claims_snapshot())
    }

    // ------------------------------------------------------------------
    // Clip dispatch
    // ------------------------------------------------------------------

    fn on_action(&mut self, name: &str) {
        if keys::is_send_claims(name) {
            self.assembly.step.final_step = true;
            if self.assembly.send_claims_child.is_none() {
                let context = self.observe_context();
                self.assembly.children.push(PendingNode::new(
                    FlowNodeKind::SendClaims { technical_profile_id: None },
                    context,
                ));
                self.assembly.send_claims_child = Some(self.assembly.children.len() - 1);
            }
        }
    }

    fn on_result(&mut self, handler: Option<&str>, result: &HandlerResultContent) {
        // Structural transitions come first: they decide which step and
        // journey level everything else in this result belongs to.
        if handler.is_some_and(keys::is_orchestration_manager) {
            match &result.statebag {
                None => self.silent_return(),
                Some(_) => {
                    if let Some(step) = result
                        .statebag_value(keys::SB_ORCHESTRATION_STEP)
                        .and_then(keys::orchestration_step)
                    {
                        self.step_boundary(step);
                    }
                }
            }
        }

        if handler.is_some_and(keys::is_enqueue_new_journey) && result.succeeded() {
            if let Some(sub_journey) = sub_journey_of(result) {
                self.enter_sub_journey(&sub_journey);
            }
        }

        // The patch belongs to whatever step is now current.
        if let Some(patch) = &result.statebag {
            self.accumulator.apply(patch);
        }

        self.extract_from_patch(result);
        self.extract_from_recorder(handler, result);

        if let Some(exception) = &result.exception {
            let message = exception.message.clone();
            let hresult = exception.hresult.clone();
            self.assembly.step.mark_error(message.as_deref(), hresult.as_deref());
            warn!(
                flow_id = %self.flow.id,
                log_id = %self.log_id,
                message = message.as_deref().unwrap_or("<none>"),
                "handler raised an exception"
            );
        }
    }

    // ------------------------------------------------------------------
    // Step lifecycle
    // ------------------------------------------------------------------

    /// Pop rule 1: an orchestration-manager result with no statebag patch.
    fn silent_return(&mut self) {
        if self.stack.is_at_root() {
            let message =
                format!("log {}: journey return with no open sub-journey", self.log_id);
            self.report(message);
            return;
        }
        self.finalize_step();
        if let Some(closed) = self.stack.pop_for_silent_return() {
            debug!(journey = %closed.journey_name, "sub-journey returned silently");
            self.tree.pop_sub_journey();
        }
    }

    /// An orchestration-manager result carrying a step value.
    fn step_boundary(&mut self, step: u32) {
        if self.assembly.opened && self.assembly.step.order == step {
            self.stack.record_step(step);
            return;
        }
        self.finalize_step();

        let resolution = self.stack.pop_until_reachable(step);
        for closed in &resolution.popped {
            debug!(journey = %closed.journey_name, to_step = step, "sub-journey closed by step gap");
            self.tree.pop_sub_journey();
        }
        if resolution.clamped {
            let message = format!(
                "log {}: step {} unreachable, gap still open at the root journey",
                self.log_id, step
            );
            self.report(message);
        }

        self.open_step(step);
        self.stack.record_step(step);
    }

    fn open_step(&mut self, order: u32) {
        let sequence = self.steps.len() as u32;
        let journey_id = self.stack.current().journey_id.clone();
        let journey_name = self.stack.current().journey_name.clone();
        let context = NodeContext::new(self.timestamp, self.alloc_sequence());

        // Staged signals observed before this boundary flush into the step.
        let staged = std::mem::replace(&mut self.assembly, StepAssembly::staging(self.timestamp));
        let mut step = staged.step;
        step.sequence = sequence;
        step.log_id = self.log_id.clone();
        step.event_instance = self.event_instance.clone();
        step.journey_id = journey_id;
        step.journey_name = journey_name;
        step.order = order;

        debug!(flow_id = %self.flow.id, order, sequence, "opened step");
        self.assembly = StepAssembly {
            opened: true,
            step,
            context,
            children: staged.children,
            scope: staged.scope,
            hrd_child: staged.hrd_child,
            send_claims_child: staged.send_claims_child,
        };
    }

    /// Freeze the in-progress step and attach it to the flat list and the
    /// tree. No-op while only staged signals exist.
    fn finalize_step(&mut self) {
        if !self.assembly.opened {
            return;
        }
        self.sync_display_scope();

        let staged = std::mem::replace(&mut self.assembly, StepAssembly::staging(self.timestamp));
        let mut step = staged.step;
        step.statebag = self.accumulator.statebag_snapshot();
        step.claims = self.accumulator.claims_snapshot();
        let context = staged
            .context
            .with_snapshots(step.statebag.clone(), step.claims.clone());

        debug!(
            flow_id = %self.flow.id,
            sequence = step.sequence,
            order = step.order,
            result = %step.result,
            "finalized step"
        );
        self.tree.add_step(step.clone(), context, staged.children);
        self.steps.push(step);
    }

    /// A successful enqueue: the parent step ends where the sub-journey
    /// begins.
    fn enter_sub_journey(&mut self, journey_id: &str) {
        self.finalize_step();
        let context = self.observe_context();
        debug!(flow_id = %self.flow.id, sub_journey = %journey_id, "entering sub-journey");
        self.stack.push(journey_id, journey_id);
        self.tree.push_sub_journey(journey_id, journey_id, context);
    }

    // ------------------------------------------------------------------
    // Entity extraction
    // ------------------------------------------------------------------

    fn extract_from_patch(&mut self, result: &HandlerResultContent) {
        if let Some(raw) = result.statebag_value(keys::SB_CURRENT_TECHNICAL_PROFILE) {
            if let Some(id) = keys::ctp_profile_id(raw) {
                let raw_value = raw.as_str().unwrap_or_default().to_string();
                if self.last_ctp.as_deref() != Some(raw_value.as_str()) {
                    let profile = TechnicalProfile::new(id);
                    self.last_ctp = Some(raw_value);
                    self.attach_profile(profile);
                }
            }
        }

        if let Some(value) = result.statebag_value(keys::SB_TARGET_CLAIMS_EXCHANGE) {
            if let Some(option) = value.as_str().filter(|s| !s.is_empty()) {
                if self.last_tage.as_deref() != Some(option) {
                    self.last_tage = Some(option.to_string());
                    self.resolve_selected_option(option);
                }
            }
        }
    }

    fn extract_from_recorder(&mut self, handler: Option<&str>, result: &HandlerResultContent) {
        let Some(recorder) = &result.recorder_record else {
            return;
        };

        for value in recorder.all(keys::REC_INITIATING_CLAIMS_EXCHANGE) {
            match TechnicalProfile::from_claims_exchange(value, false) {
                Some(profile) => self.attach_profile(profile),
                None => {
                    let message = format!(
                        "log {}: claims-exchange entry without a technical profile id",
                        self.log_id
                    );
                    self.report(message);
                }
            }
        }
        for value in recorder.all(keys::REC_INITIATING_BACKEND_CLAIMS_EXCHANGE) {
            match TechnicalProfile::from_claims_exchange(value, true) {
                Some(profile) => self.attach_profile(profile),
                None => {
                    let message = format!(
                        "log {}: backend claims-exchange entry without a technical profile id",
                        self.log_id
                    );
                    self.report(message);
                }
            }
        }

        for value in recorder
            .all(keys::REC_ENABLED_FOR_USER_JOURNEYS)
            .chain(recorder.all(keys::REC_HOME_REALM_DISCOVERY))
        {
            match keys::technical_profile_candidates(value) {
                Some(options) => self.attach_selectable_options(options),
                None => {
                    let message = format!(
                        "log {}: unrecognized candidate list shape in HRD entry",
                        self.log_id
                    );
                    self.report(message);
                }
            }
        }

        for value in recorder.all(keys::REC_CLAIMS_TRANSFORMATION) {
            match ClaimsTransformation::from_recorder_value(value) {
                Some(transformation) => self.attach_transformation(transformation),
                None => {
                    let message =
                        format!("log {}: claims transformation entry without an id", self.log_id);
                    self.report(message);
                }
            }
        }

        for value in recorder.all(keys::REC_DISPLAY_CONTROL_ACTION) {
            match DisplayControlAction::from_recorder_value(value) {
                Some(action) => self.open_display_scope(action),
                None => {
                    let message =
                        format!("log {}: display control action without an id", self.log_id);
                    self.report(message);
                }
            }
        }

        for value in recorder.all(keys::REC_VALIDATION_TECHNICAL_PROFILE) {
            match keys::validation_profile_id(value) {
                Some(id) => self.assembly.step.note_validation_profile(&id),
                None => {
                    let message =
                        format!("log {}: validation profile entry without an id", self.log_id);
                    self.report(message);
                }
            }
        }

        if let Some(value) = recorder.first(keys::REC_SEND_CLAIMS) {
            let issuer = value
                .get("TechnicalProfileId")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            self.mark_send_claims(issuer);
        }

        if recorder.contains(keys::REC_JOURNEY_COMPLETED) {
            self.assembly.step.final_step = true;
        }

        // A failing self-asserted validation surfaces its exception through
        // the recorder rather than the result envelope.
        if handler.is_some_and(keys::is_self_asserted_validation) && result.result == Some(false) {
            if let Some(value) = recorder.first(keys::REC_EXCEPTION) {
                let (message, hresult) = exception_parts(value);
                self.assembly.step.mark_error(message.as_deref(), hresult.as_deref());
            }
        }
    }

    fn attach_profile(&mut self, mut profile: TechnicalProfile) {
        let context = self.observe_context();

        // Inside an open display-control scope the profile belongs to the
        // action, not the step's own invocation list.
        if let Some(scope) = &self.assembly.scope {
            profile.display_control = Some(scope.control_id.clone());
            let control = &mut self.assembly.step.display_controls[scope.control_index];
            match control.technical_profiles.iter_mut().find(|p| p.id == profile.id) {
                Some(existing) => existing.merge(&profile),
                None => {
                    control.technical_profiles.push(profile.clone());
                    let node = PendingNode::new(FlowNodeKind::TechnicalProfile(profile), context);
                    self.assembly.children[scope.child_index].children.push(node);
                }
            }
            return;
        }

        let is_new = !self
            .assembly
            .step
            .technical_profile_names
            .iter()
            .any(|name| name == &profile.id);
        self.assembly.step.add_technical_profile(profile.clone());
        if is_new {
            let node = PendingNode::new(FlowNodeKind::TechnicalProfile(profile), context);
            self.assembly.children.push(node);
        }
    }

    fn attach_transformation(&mut self, transformation: ClaimsTransformation) {
        let context = self.observe_context();

        if let Some(scope) = &self.assembly.scope {
            let control = &mut self.assembly.step.display_controls[scope.control_index];
            if !control.claims_transformations.iter().any(|t| t.id == transformation.id) {
                control.claims_transformations.push(transformation.clone());
                let node =
                    PendingNode::new(FlowNodeKind::ClaimsTransformation(transformation), context);
                self.assembly.children[scope.child_index].children.push(node);
            }
            return;
        }

        let is_new = !self
            .assembly
            .step
            .claims_transformation_ids
            .iter()
            .any(|id| id == &transformation.id);
        self.assembly.step.add_claims_transformation(transformation.clone());
        if is_new {
            let node = PendingNode::new(FlowNodeKind::ClaimsTransformation(transformation), context);
            self.assembly.children.push(node);
        }
    }

    /// Merge an HRD candidate list into the in-progress step. Candidates
    /// name choices offered, not profiles invoked, so they stay out of
    /// `technical_profile_names`.
    fn attach_selectable_options(&mut self, options: Vec<String>) {
        if options.is_empty() {
            return;
        }
        let mut merged = self.assembly.step.selectable_options.clone();
        for option in options {
            if !merged.contains(&option) {
                merged.push(option);
            }
        }
        self.assembly.step.set_selectable_options(merged.clone());

        match self.assembly.hrd_child {
            Some(index) => {
                if let FlowNodeKind::HomeRealmDiscovery { options, .. } =
                    &mut self.assembly.children[index].kind
                {
                    *options = merged;
                }
            }
            None => {
                let context = self.observe_context();
                self.assembly.children.push(PendingNode::new(
                    FlowNodeKind::HomeRealmDiscovery { options: merged, selected: None },
                    context,
                ));
                self.assembly.hrd_child = Some(self.assembly.children.len() - 1);
            }
        }
    }

    /// Attach a `TAGE` selection to the HRD step that offered the choice.
    fn resolve_selected_option(&mut self, option: &str) {
        if self.assembly.opened
            && !self.assembly.step.selectable_options.is_empty()
            && self.assembly.step.selected_option.is_none()
        {
            self.assembly.step.selected_option = Some(option.to_string());
            if let Some(index) = self.assembly.hrd_child {
                if let FlowNodeKind::HomeRealmDiscovery { selected, .. } =
                    &mut self.assembly.children[index].kind
                {
                    *selected = Some(option.to_string());
                }
            }
            return;
        }

        // Late arrival: the offering step was already finalized. This is the
        // one sanctioned retro-write, scoped to the selection field.
        let target = self
            .steps
            .iter()
            .rposition(|step| !step.selectable_options.is_empty() && step.selected_option.is_none());
        match target {
            Some(index) => {
                self.steps[index].selected_option = Some(option.to_string());
                self.tree.set_step_selected_option(index, option);
                debug!(flow_id = %self.flow.id, step = index, option, "backfilled HRD selection");
            }
            None => {
                debug!(flow_id = %self.flow.id, option, "selection with no offering step, ignored");
            }
        }
    }

    fn open_display_scope(&mut self, action: DisplayControlAction) {
        self.sync_display_scope();

        let control_index = match self
            .assembly
            .step
            .display_controls
            .iter()
            .position(|c| c.id == action.id && c.action == action.action)
        {
            Some(index) => index,
            None => {
                self.assembly.step.display_controls.push(action.clone());
                self.assembly.step.display_controls.len() - 1
            }
        };

        let child_index = match self.assembly.children.iter().position(|child| {
            matches!(&child.kind, FlowNodeKind::DisplayControl(existing)
                if existing.id == action.id && existing.action == action.action)
        }) {
            Some(index) => index,
            None => {
                let context = self.observe_context();
                self.assembly
                    .children
                    .push(PendingNode::new(FlowNodeKind::DisplayControl(action.clone()), context));
                self.assembly.children.len() - 1
            }
        };

        self.assembly.scope =
            Some(DisplayScope { child_index, control_index, control_id: action.id });
    }

    /// Copy the accumulated nested entities of the open display scope back
    /// into its node payload before the scope closes.
    fn sync_display_scope(&mut self) {
        if let Some(scope) = self.assembly.scope.take() {
            let control = self.assembly.step.display_controls[scope.control_index].clone();
            if let FlowNodeKind::DisplayControl(payload) =
                &mut self.assembly.children[scope.child_index].kind
            {
                *payload = control;
            }
        }
    }

    fn mark_send_claims(&mut self, issuer: Option<String>) {
        self.assembly.step.final_step = true;
        if let Some(id) = &issuer {
            self.assembly.step.note_profile_name(id);
        }
        match self.assembly.send_claims_child {
            Some(index) => {
                if let FlowNodeKind::SendClaims { technical_profile_id } =
                    &mut self.assembly.children[index].kind
                {
                    if technical_profile_id.is_none() {
                        *technical_profile_id = issuer;
                    }
                }
            }
            None => {
                let context = self.observe_context();
                self.assembly.children.push(PendingNode::new(
                    FlowNodeKind::SendClaims { technical_profile_id: issuer },
                    context,
                ));
                self.assembly.send_claims_child = Some(self.assembly.children.len() - 1);
            }
        }
    }

    fn finish(mut self) -> FlowTrace {
        self.finalize_step();
        FlowTrace {
            flow_id: self.flow.id.clone(),
            tree: self.tree.finish(),
            steps: self.steps,
            final_claims: self.accumulator.claims_snapshot(),
            final_statebag: self.accumulator.statebag_snapshot(),
            errors: self.errors,
        }
    }
}

fn sub_journey_of(result: &HandlerResultContent) -> Option<String> {
    result
        .recorder_value(keys::REC_SUB_JOURNEY_INVOKED)
        .or_else(|| result.recorder_value(keys::REC_SUB_JOURNEY))
        .and_then(keys::sub_journey_id)
}

/// Message and HResult out of a recorder exception payload, which is either
/// a `{Message, HResult}` object or a bare message string.
fn exception_parts(value: &Value) -> (Option<String>, Option<String>) {
    match value {
        Value::Object(map) => {
            let message = map
                .get("Message")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let hresult = map.get("HResult").map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            (message, hresult)
        }
        Value::String(message) if !message.is_empty() => (Some(message.clone()), None),
        _ => (None, None),
    }
}

/// Replay one flow's records into a [`FlowTrace`].
///
/// Never fails: a flow whose clips cannot be fully interpreted still yields
/// whatever steps were finalized, with the anomalies listed in `errors`.
pub fn interpret_flow(flow: &UserFlow, records: &[LogRecord], config: &ReplayConfig) -> FlowTrace {
    let logs = logs_for_flow(records, flow);
    let root_name = flow
        .policy_id
        .clone()
        .or_else(|| config.root_journey_name.clone())
        .unwrap_or_else(|| flow.id.clone());
    Interpreter::new(flow, &root_name, config).run(&logs)
}

/// Look up a flow by id and replay it.
pub fn replay_flow(
    records: &[LogRecord],
    flows: &[UserFlow],
    flow_id: &str,
    config: &ReplayConfig,
) -> Result<FlowTrace> {
    let flow = flows
        .iter()
        .find(|f| f.id == flow_id)
        .ok_or_else(|| TraceError::UnknownFlow(flow_id.to_string()))?;
    if logs_for_flow(records, flow).is_empty() {
        return Err(TraceError::EmptyFlow(flow_id.to_string()));
    }
    Ok(interpret_flow(flow, records, config))
}

/// Backfill a flow's identity fields from a finished trace.
pub fn enrich_flow(flow: &mut UserFlow, trace: &FlowTrace) {
    let email = keys::EMAIL_CLAIM_CANDIDATES
        .iter()
        .find_map(|key| trace.final_claims.get(*key))
        .map(String::as_str);
    let object_id = trace.final_claims.get(keys::OBJECT_ID_CLAIM).map(String::as_str);
    flow.absorb_identity(email, object_id);
}
