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

//! Flow grouping.
//!
//! Splits a pile of log records into distinct execution attempts. Records
//! sharing a correlation id usually belong to one flow, but the same browser
//! session can run the policy several times (retry, back-navigation), so the
//! grouper watches the orchestration step counter for restarts:
//!
//! - step 0 appearing again starts a new flow, *unless* the previous record
//!   just enqueued a sub-journey (sub-journeys legitimately reset the
//!   counter);
//! - the step counter moving backward starts a new flow under the same
//!   exception.
//!
//! A record with no step value at all is always a continuation, never a
//! restart.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace};

use journeytrace_core::flow::UserFlow;
use journeytrace_core::keys::{self, ResolvedIdentity};
use journeytrace_core::record::{Clip, LogRecord};

/// Per-correlation-id grouping state.
#[derive(Debug)]
struct FlowTracker {
    /// Index of the open flow in the output list.
    flow_index: usize,
    /// Final step value of the most recent record that carried any step.
    /// Deliberately the *last* value, not the maximum: a sub-journey's low
    /// step numbers must not read as back-navigation against the parent's
    /// higher counter.
    last_seen_step: u32,
    /// Step values already counted into `step_count`.
    counted_steps: HashSet<u32>,
    /// Whether the previous record enqueued a sub-journey.
    prev_enqueued: bool,
}

impl FlowTracker {
    fn new(flow_index: usize) -> Self {
        Self {
            flow_index,
            last_seen_step: 0,
            counted_steps: HashSet::new(),
            prev_enqueued: false,
        }
    }
}

/// Everything grouping needs to know about one record, gathered in a single
/// pass over its clips.
#[derive(Debug, Default)]
struct RecordSignals {
    /// Step values in clip order, duplicates preserved.
    steps: Vec<u32>,
    has_step_zero: bool,
    enqueued_sub_journey: bool,
    sub_journeys: Vec<String>,
    completed: bool,
    cancelled: bool,
    has_errors: bool,
    identity: ResolvedIdentity,
    policy_id: Option<String>,
}

impl RecordSignals {
    fn scan(record: &LogRecord) -> Self {
        let mut signals = Self::default();
        let mut handler: Option<&str> = None;
        let mut complex_claims: Option<&Value> = None;

        for clip in &record.clips {
            match clip {
                Clip::Headers(headers) => {
                    if signals.policy_id.is_none() {
                        signals.policy_id = headers.policy_id.clone();
                    }
                }
                Clip::Action(name) | Clip::Predicate(name) => {
                    if keys::is_send_claims(name) {
                        signals.completed = true;
                    }
                    handler = Some(name);
                }
                Clip::HandlerResult(result) => {
                    if let Some(step) = result
                        .statebag_value(keys::SB_ORCHESTRATION_STEP)
                        .and_then(keys::orchestration_step)
                    {
                        signals.has_step_zero |= step == 0;
                        signals.steps.push(step);
                    }
                    if let Some(value) = result.statebag_value(keys::SB_IS_CANCELLED) {
                        signals.cancelled |= keys::truthy(value);
                    }
                    if let Some(value) = result.statebag_value(keys::SB_COMPLEX_CLAIMS) {
                        complex_claims = Some(value);
                    }
                    if result.exception.is_some() {
                        signals.has_errors = true;
                    }

                    let sub_journey = result
                        .recorder_value(keys::REC_SUB_JOURNEY_INVOKED)
                        .or_else(|| result.recorder_value(keys::REC_SUB_JOURNEY))
                        .and_then(keys::sub_journey_id);
                    if let Some(id) = &sub_journey {
                        signals.sub_journeys.push(id.clone());
                    }
                    if sub_journey.is_some()
                        && result.succeeded()
                        && handler.is_some_and(keys::is_enqueue_new_journey)
                    {
                        signals.enqueued_sub_journey = true;
                    }

                    if let Some(record) = &result.recorder_record {
                        if record.contains(keys::REC_JOURNEY_COMPLETED) {
                            signals.completed = true;
                        }
                    }
                    if let Some(value) = result.recorder_value(keys::REC_API_RESULT) {
                        signals.cancelled |= keys::api_result_cancelled(value);
                    }
                }
                Clip::Unknown => {}
            }
        }

        if let Some(value) = complex_claims {
            signals.identity = keys::resolved_identity(value);
        }
        signals
    }

    fn min_step(&self) -> Option<u32> {
        self.steps.iter().copied().min()
    }

    fn final_step(&self) -> Option<u32> {
        self.steps.last().copied()
    }
}

/// Group records into user flows.
///
/// Pure and deterministic regardless of input order: records are sorted by
/// timestamp (record id as tie-break) before grouping.
pub fn group_flows(records: &[LogRecord]) -> Vec<UserFlow> {
    let mut ordered: Vec<&LogRecord> = records.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let mut flows: Vec<UserFlow> = Vec::new();
    let mut trackers: HashMap<String, FlowTracker> = HashMap::new();
    let mut ordinals: HashMap<String, usize> = HashMap::new();

    for record in ordered {
        let signals = RecordSignals::scan(record);

        let restart = match trackers.get(&record.correlation_id) {
            None => true,
            Some(tracker) if tracker.prev_enqueued => false,
            Some(tracker) => {
                signals.has_step_zero
                    || signals.min_step().is_some_and(|min| min < tracker.last_seen_step)
            }
        };

        if restart {
            let ordinal = ordinals.entry(record.correlation_id.clone()).or_insert(0);
            let flow = UserFlow::new(&record.correlation_id, *ordinal, record.timestamp);
            debug!(
                flow_id = %flow.id,
                correlation_id = %record.correlation_id,
                "opening flow"
            );
            *ordinal += 1;
            flows.push(flow);
            trackers.insert(record.correlation_id.clone(), FlowTracker::new(flows.len() - 1));
        }

        // A tracker exists for this correlation id from here on.
        let Some(tracker) = trackers.get_mut(&record.correlation_id) else {
            continue;
        };
        let flow = &mut flows[tracker.flow_index];

        flow.log_ids.push(record.id.clone());
        flow.ended_at = record.timestamp;
        if flow.policy_id.is_none() {
            flow.policy_id = record.policy_id.clone().or_else(|| signals.policy_id.clone());
        }
        flow.step_count += signals
            .steps
            .iter()
            .filter(|step| **step != 0 && tracker.counted_steps.insert(**step))
            .count() as u32;
        flow.completed |= signals.completed;
        flow.has_errors |= signals.has_errors;
        flow.cancelled |= signals.cancelled;
        for sub_journey in &signals.sub_journeys {
            flow.note_sub_journey(sub_journey);
        }
        flow.absorb_identity(signals.identity.email.as_deref(), signals.identity.object_id.as_deref());

        if let Some(final_step) = signals.final_step() {
            tracker.last_seen_step = final_step;
        }
        tracker.prev_enqueued = signals.enqueued_sub_journey;
        trace!(
            record_id = %record.id,
            flow_id = %flow.id,
            restart,
            last_seen_step = tracker.last_seen_step,
            "record grouped"
        );
    }

    flows
}

/// The records belonging to one flow, in timestamp order.
pub fn logs_for_flow<'a>(records: &'a [LogRecord], flow: &UserFlow) -> Vec<&'a LogRecord> {
    let members: HashSet<&str> = flow.log_ids.iter().map(String::as_str).collect();
    let mut logs: Vec<&LogRecord> = records
        .iter()
        .filter(|record| members.contains(record.id.as_str()))
        .collect();
    logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    logs
}
