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

//! Statebag accumulation.
//!
//! The engine reports state as partial patches; the accumulator folds them
//! into the current picture of the statebag. Later values for a key win,
//! untouched keys persist. One accumulator lives for exactly one flow.
//!
//! Snapshots are structural copies. Finalized steps must hold frozen state,
//! never a live reference into the accumulator, or later patches would
//! rewrite history.

use std::collections::BTreeMap;

use serde_json::Value;

use journeytrace_core::config::ClaimsFilter;
use journeytrace_core::keys::{self, ResolvedIdentity};
use journeytrace_core::record::StatebagPatch;

/// Folds statebag patches and derives the claims view.
#[derive(Debug, Clone)]
pub struct StatebagAccumulator {
    filter: ClaimsFilter,
    state: BTreeMap<String, Value>,
}

impl StatebagAccumulator {
    pub fn new(filter: ClaimsFilter) -> Self {
        Self { filter, state: BTreeMap::new() }
    }

    /// Fold a partial patch over the accumulated state.
    pub fn apply(&mut self, patch: &StatebagPatch) {
        for (key, entry) in patch {
            self.state.insert(key.clone(), entry.value().clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Frozen copy of the full statebag.
    pub fn statebag_snapshot(&self) -> BTreeMap<String, Value> {
        self.state.clone()
    }

    /// Frozen copy of the claims view: control keys filtered out, the
    /// complex-claims container expanded one level, values rendered as
    /// strings.
    ///
    /// A direct statebag key wins over an expanded complex-claims member of
    /// the same name.
    pub fn claims_snapshot(&self) -> BTreeMap<String, String> {
        let mut claims = BTreeMap::new();

        if self.filter.expand_complex_claims {
            if let Some(Value::Object(members)) = self.state.get(keys::SB_COMPLEX_CLAIMS) {
                for (key, value) in members {
                    if self.filter.is_claim(key) {
                        claims.insert(key.clone(), keys::claim_string(value));
                    }
                }
            }
        }

        for (key, value) in &self.state {
            if self.filter.is_claim(key) {
                claims.insert(key.clone(), keys::claim_string(value));
            }
        }

        claims
    }

    /// The user identity currently resolvable from the complex-claims
    /// container.
    pub fn resolved_identity(&self) -> ResolvedIdentity {
        self.state
            .get(keys::SB_COMPLEX_CLAIMS)
            .map(keys::resolved_identity)
            .unwrap_or_default()
    }
}
