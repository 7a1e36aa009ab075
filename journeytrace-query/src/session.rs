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

//! Generation-guarded analysis session.
//!
//! Interpreting a large flow takes long enough that a second selection can
//! land before the first finishes. Every selection claims a ticket; finished
//! traces apply last-writer-wins, so a slow result for an old selection is
//! computed to completion but never overwrites a newer one.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use journeytrace_core::{parse_records, LogRecord, ReplayConfig, Result, UserFlow};
use journeytrace_replay::{enrich_flow, group_flows, replay_flow, FlowTrace};

use crate::navigate::NodeIndex;

/// Monotonic selection ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// The applied trace plus its navigation index, tagged with the ticket that
/// produced it.
#[derive(Debug)]
struct ActiveTrace {
    generation: Generation,
    trace: FlowTrace,
    index: NodeIndex,
}

/// Owns one diagnostic capture end to end: parsed records, grouped flows and
/// the currently selected trace. Thread-safe behind shared references.
pub struct AnalysisSession {
    records: Vec<LogRecord>,
    flows: RwLock<Vec<UserFlow>>,
    config: ReplayConfig,
    tickets: AtomicU64,
    active: RwLock<Option<ActiveTrace>>,
}

impl AnalysisSession {
    /// Group a parsed capture into flows and wrap it in a session.
    pub fn new(records: Vec<LogRecord>, config: ReplayConfig) -> Self {
        let flows = group_flows(&records);
        Self {
            records,
            flows: RwLock::new(flows),
            config,
            tickets: AtomicU64::new(0),
            active: RwLock::new(None),
        }
    }

    /// Parse a raw capture and group it in one go.
    pub fn from_source(source: &str, config: ReplayConfig) -> Result<Self> {
        Ok(Self::new(parse_records(source)?, config))
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Snapshot of the grouped flows, identity enrichment included.
    pub fn flows(&self) -> Vec<UserFlow> {
        self.flows.read().clone()
    }

    pub fn flow_count(&self) -> usize {
        self.flows.read().len()
    }

    /// Claim the next selection ticket.
    pub fn begin_selection(&self) -> Generation {
        Generation(self.tickets.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Interpret one flow. Touches no session state; nothing shows up until
    /// [`apply`](Self::apply) accepts the result.
    pub fn interpret(&self, flow_id: &str) -> Result<FlowTrace> {
        let flows = self.flows.read();
        replay_flow(&self.records, &flows, flow_id, &self.config)
    }

    /// Apply a finished trace under its ticket.
    ///
    /// Returns false and drops the trace when a selection with a later
    /// ticket has already been applied. On success the matching flow's
    /// identity fields are backfilled from the trace.
    pub fn apply(&self, generation: Generation, trace: FlowTrace) -> bool {
        let mut active = self.active.write();
        if let Some(current) = active.as_ref() {
            if current.generation >= generation {
                debug!(
                    stale = generation.value(),
                    applied = current.generation.value(),
                    flow_id = %trace.flow_id,
                    "discarding superseded trace"
                );
                return false;
            }
        }
        {
            let mut flows = self.flows.write();
            if let Some(flow) = flows.iter_mut().find(|f| f.id == trace.flow_id) {
                enrich_flow(flow, &trace);
            }
        }
        let index = NodeIndex::build(&trace.tree);
        *active = Some(ActiveTrace { generation, trace, index });
        true
    }

    /// Select a flow synchronously: ticket, interpret, apply.
    pub fn select(&self, flow_id: &str) -> Result<bool> {
        let generation = self.begin_selection();
        let trace = self.interpret(flow_id)?;
        Ok(self.apply(generation, trace))
    }

    pub fn selected_flow_id(&self) -> Option<String> {
        self.active.read().as_ref().map(|active| active.trace.flow_id.clone())
    }

    /// Generation of the applied trace, if any.
    pub fn applied_generation(&self) -> Option<Generation> {
        self.active.read().as_ref().map(|active| active.generation)
    }

    /// Run a closure against the applied trace and its navigation index.
    pub fn with_selected<R>(&self, f: impl FnOnce(&FlowTrace, &NodeIndex) -> R) -> Option<R> {
        let active = self.active.read();
        active.as_ref().map(|active| f(&active.trace, &active.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use journeytrace_core::keys::SB_ORCHESTRATION_STEP;
    use journeytrace_core::{Clip, HandlerResultContent, StatebagEntry, StatebagPatch};
    use serde_json::json;

    fn record(id: &str, sec: u32, step: u32, claims: &[(&str, &str)]) -> LogRecord {
        let mut statebag = StatebagPatch::new();
        statebag.insert(
            SB_ORCHESTRATION_STEP.to_string(),
            StatebagEntry::of(json!(step.to_string())),
        );
        for (key, value) in claims {
            statebag.insert(key.to_string(), StatebagEntry::of(json!(value)));
        }
        LogRecord {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, sec).unwrap(),
            correlation_id: "corr-1".to_string(),
            policy_id: Some("B2C_1A_SignIn".to_string()),
            clips: vec![
                Clip::Action(
                    "Web.TPEngine.StateMachineHandlers.OrchestrationManager".to_string(),
                ),
                Clip::HandlerResult(HandlerResultContent {
                    result: Some(true),
                    statebag: Some(statebag),
                    recorder_record: None,
                    exception: None,
                }),
            ],
        }
    }

    fn capture() -> Vec<LogRecord> {
        vec![
            record("log-1", 0, 1, &[("signInName", "ada@contoso.example")]),
            record("log-2", 1, 2, &[("objectId", "9f8e")]),
        ]
    }

    #[test]
    fn test_session_groups_on_construction() {
        let session = AnalysisSession::new(capture(), ReplayConfig::default());
        assert_eq!(session.flow_count(), 1);
        assert_eq!(session.flows()[0].id, "corr-1-0");
        assert!(session.selected_flow_id().is_none());
    }

    #[test]
    fn test_tickets_increase_monotonically() {
        let session = AnalysisSession::new(capture(), ReplayConfig::default());
        let first = session.begin_selection();
        let second = session.begin_selection();
        assert!(second > first);
    }

    #[test]
    fn test_select_applies_and_enriches() {
        let session = AnalysisSession::new(capture(), ReplayConfig::default());
        assert!(session.select("corr-1-0").unwrap());
        assert_eq!(session.selected_flow_id().as_deref(), Some("corr-1-0"));

        let steps = session.with_selected(|trace, index| {
            assert_eq!(index.step_count(), trace.steps.len());
            trace.steps.len()
        });
        assert_eq!(steps, Some(2));

        let flow = &session.flows()[0];
        assert_eq!(flow.user_email.as_deref(), Some("ada@contoso.example"));
        assert_eq!(flow.user_object_id.as_deref(), Some("9f8e"));
    }

    #[test]
    fn test_stale_generation_is_never_applied() {
        let session = AnalysisSession::new(capture(), ReplayConfig::default());
        let early = session.begin_selection();
        let late = session.begin_selection();

        let late_trace = session.interpret("corr-1-0").unwrap();
        assert!(session.apply(late, late_trace));

        // The early selection finishes afterwards; its result is complete
        // but must not displace the later one.
        let early_trace = session.interpret("corr-1-0").unwrap();
        assert!(!session.apply(early, early_trace));
        assert_eq!(session.applied_generation(), Some(late));
    }

    #[test]
    fn test_unknown_flow_selection_fails() {
        let session = AnalysisSession::new(capture(), ReplayConfig::default());
        assert!(session.select("corr-9-0").is_err());
        assert!(session.selected_flow_id().is_none());
    }
}
