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

//! Journey nesting stack.
//!
//! Replay tracks which journey level an orchestration step belongs to with a
//! plain stack: the root journey at the bottom, one entry per active
//! sub-journey above it. The engine never announces sub-journey returns
//! explicitly, so two pop rules recover them:
//!
//! 1. **Silent return** — an orchestration-manager result with no statebag
//!    patch at all means control went back to the caller: pop one level.
//! 2. **Gap detection** — a step value that jumps more than one past the
//!    current level's high-water mark means one or more sub-journeys
//!    returned while the parent's counter had already advanced: pop one
//!    level at a time, re-checking the gap against each newly exposed level.
//!
//! Both rules clamp at the root instead of failing; callers report the
//! clamp. Both are idempotent: re-applying them to an already-resolved
//! stack pops nothing.

use serde::{Deserialize, Serialize};

/// One active journey nesting level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyStackEntry {
    pub journey_id: String,
    pub journey_name: String,
    /// The parent's step value at the moment this level was entered.
    pub entered_at_step: u32,
    /// Highest step value observed while this level has been on the stack.
    /// Non-decreasing for the entry's whole lifetime.
    pub last_step: u32,
}

/// Result of resolving a step value against the stack with the gap rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GapResolution {
    /// Levels closed, innermost first.
    pub popped: Vec<JourneyStackEntry>,
    /// The gap was still open when the root was reached.
    pub clamped: bool,
}

/// The journey nesting stack. Depth is always at least one: the root level
/// is created at construction and never popped.
#[derive(Debug, Clone)]
pub struct JourneyStack {
    entries: Vec<JourneyStackEntry>,
}

impl JourneyStack {
    pub fn new(root_id: impl Into<String>, root_name: impl Into<String>) -> Self {
        Self {
            entries: vec![JourneyStackEntry {
                journey_id: root_id.into(),
                journey_name: root_name.into(),
                entered_at_step: 0,
                last_step: 0,
            }],
        }
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_at_root(&self) -> bool {
        self.entries.len() == 1
    }

    /// The currently active level.
    pub fn current(&self) -> &JourneyStackEntry {
        // Depth >= 1 by construction.
        &self.entries[self.entries.len() - 1]
    }

    /// Enter a sub-journey. Its entry step is the current level's high-water
    /// mark; its own step counter starts over.
    pub fn push(&mut self, journey_id: impl Into<String>, journey_name: impl Into<String>) {
        let entered_at_step = self.current().last_step;
        self.entries.push(JourneyStackEntry {
            journey_id: journey_id.into(),
            journey_name: journey_name.into(),
            entered_at_step,
            last_step: 0,
        });
    }

    /// Record an observed step value on the current level.
    ///
    /// The mark max-propagates through all ancestors, so an inner journey
    /// that overruns an outer counter leaves the outer marks high enough
    /// that later gap checks stay conservative rather than cascading past
    /// the level the step really belonged to.
    pub fn record_step(&mut self, step: u32) {
        for entry in &mut self.entries {
            entry.last_step = entry.last_step.max(step);
        }
    }

    /// Pop rule 1: control returned to the caller with no new step.
    ///
    /// Returns the closed level, or `None` when already at the root (the
    /// clamp case — nothing is popped).
    pub fn pop_for_silent_return(&mut self) -> Option<JourneyStackEntry> {
        if self.is_at_root() {
            return None;
        }
        self.entries.pop()
    }

    /// Pop rule 2: resolve which level an incoming step value belongs to.
    ///
    /// Pops one level at a time while the value is more than one past the
    /// current level's high-water mark, stopping when the gap closes or the
    /// root is reached. Idempotent: a resolved stack pops nothing.
    pub fn pop_until_reachable(&mut self, step: u32) -> GapResolution {
        let mut resolution = GapResolution::default();
        loop {
            let gap = i64::from(step) - i64::from(self.current().last_step);
            if gap <= 1 {
                return resolution;
            }
            if self.is_at_root() {
                resolution.clamped = true;
                return resolution;
            }
            // Depth > 1 checked above.
            if let Some(entry) = self.entries.pop() {
                resolution.popped.push(entry);
            }
        }
    }
}
