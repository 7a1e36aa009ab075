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

//! Replay configuration.
//!
//! Everything here is serde round-trippable so hosts can load it from their
//! own config layer; every field falls back to a sensible default when
//! absent.

use serde::{Deserialize, Serialize};

use crate::keys;

/// Which statebag keys the claims view exposes.
///
/// The statebag mixes user claims with orchestration control keys; the
/// filter keeps the control plumbing out of the claims snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsFilter {
    /// Exact keys never exposed as claims.
    #[serde(default = "default_excluded_keys")]
    pub excluded_keys: Vec<String>,
    /// Key prefixes never exposed as claims.
    #[serde(default)]
    pub excluded_prefixes: Vec<String>,
    /// Expand the complex-claims container one level so its members appear
    /// as ordinary claims.
    #[serde(default = "default_true")]
    pub expand_complex_claims: bool,
}

impl ClaimsFilter {
    /// Whether a statebag key belongs in the claims view.
    pub fn is_claim(&self, key: &str) -> bool {
        !self.excluded_keys.iter().any(|k| k == key)
            && !self.excluded_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

impl Default for ClaimsFilter {
    fn default() -> Self {
        Self {
            excluded_keys: default_excluded_keys(),
            excluded_prefixes: Vec::new(),
            expand_complex_claims: true,
        }
    }
}

fn default_excluded_keys() -> Vec<String> {
    [
        keys::SB_ORCHESTRATION_STEP,
        keys::SB_CURRENT_TECHNICAL_PROFILE,
        keys::SB_TARGET_CLAIMS_EXCHANGE,
        keys::SB_MACHINE_STATE,
        keys::SB_IS_CANCELLED,
        keys::SB_COMPLEX_CLAIMS,
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_true() -> bool {
    true
}

/// Knobs for one replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayConfig {
    #[serde(default)]
    pub claims_filter: ClaimsFilter,
    /// Label for the root journey context when the flow has no policy id.
    #[serde(default)]
    pub root_journey_name: Option<String>,
}
