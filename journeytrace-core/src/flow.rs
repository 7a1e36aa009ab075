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

//! User flow summaries.
//!
//! A [`UserFlow`] is one distinct execution attempt of a policy under a
//! correlation id. The grouper creates flows and keeps their summary fields
//! current while records stream in; the interpreter later backfills identity
//! once the statebag has been replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution attempt: the unit the flow picker lists and the replay
/// interpreter operates on.
///
/// Identity fields (`id`, `correlation_id`) are fixed at creation; the
/// summary fields keep moving while grouping appends records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFlow {
    /// `{correlationId}-{ordinal}` where the ordinal counts flows already
    /// created for the same correlation id.
    pub id: String,
    pub correlation_id: String,
    /// Policy id from the first record that carried one.
    pub policy_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Member log-record ids in append order.
    pub log_ids: Vec<String>,
    /// Count of distinct nonzero orchestration steps observed.
    pub step_count: u32,
    pub completed: bool,
    pub has_errors: bool,
    pub cancelled: bool,
    pub user_email: Option<String>,
    pub user_object_id: Option<String>,
    /// Sub-journey ids in first-seen order, deduplicated.
    pub sub_journeys: Vec<String>,
}

impl UserFlow {
    pub fn new(correlation_id: &str, ordinal: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Self::flow_id(correlation_id, ordinal),
            correlation_id: correlation_id.to_string(),
            policy_id: None,
            started_at,
            ended_at: started_at,
            log_ids: Vec::new(),
            step_count: 0,
            completed: false,
            has_errors: false,
            cancelled: false,
            user_email: None,
            user_object_id: None,
            sub_journeys: Vec::new(),
        }
    }

    /// The id an ordinal'th flow under a correlation id receives.
    pub fn flow_id(correlation_id: &str, ordinal: usize) -> String {
        format!("{correlation_id}-{ordinal}")
    }

    /// Backfill identity fields, never overwriting values already resolved.
    pub fn absorb_identity(&mut self, email: Option<&str>, object_id: Option<&str>) {
        if self.user_email.is_none() {
            self.user_email = email.filter(|s| !s.is_empty()).map(str::to_string);
        }
        if self.user_object_id.is_none() {
            self.user_object_id = object_id.filter(|s| !s.is_empty()).map(str::to_string);
        }
    }

    /// Record a sub-journey id, keeping the list deduplicated in first-seen
    /// order.
    pub fn note_sub_journey(&mut self, journey_id: &str) {
        if !self.sub_journeys.iter().any(|id| id == journey_id) {
            self.sub_journeys.push(journey_id.to_string());
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, secs).unwrap()
    }

    #[test]
    fn test_flow_id_format() {
        assert_eq!(UserFlow::flow_id("corr-1", 0), "corr-1-0");
        assert_eq!(UserFlow::flow_id("corr-1", 2), "corr-1-2");

        let flow = UserFlow::new("corr-1", 1, at(0));
        assert_eq!(flow.id, "corr-1-1");
        assert_eq!(flow.correlation_id, "corr-1");
        assert_eq!(flow.started_at, flow.ended_at);
    }

    #[test]
    fn test_absorb_identity_fills_only_unset() {
        let mut flow = UserFlow::new("corr-1", 0, at(0));
        flow.absorb_identity(Some("ada@contoso.example"), None);
        assert_eq!(flow.user_email.as_deref(), Some("ada@contoso.example"));
        assert!(flow.user_object_id.is_none());

        flow.absorb_identity(Some("other@contoso.example"), Some("oid-1"));
        assert_eq!(flow.user_email.as_deref(), Some("ada@contoso.example"));
        assert_eq!(flow.user_object_id.as_deref(), Some("oid-1"));
    }

    #[test]
    fn test_absorb_identity_ignores_empty_strings() {
        let mut flow = UserFlow::new("corr-1", 0, at(0));
        flow.absorb_identity(Some(""), Some(""));
        assert!(flow.user_email.is_none());
        assert!(flow.user_object_id.is_none());
    }

    #[test]
    fn test_sub_journeys_deduplicated_in_order() {
        let mut flow = UserFlow::new("corr-1", 0, at(0));
        flow.note_sub_journey("PasswordReset");
        flow.note_sub_journey("MfaCheck");
        flow.note_sub_journey("PasswordReset");
        assert_eq!(flow.sub_journeys, vec!["PasswordReset", "MfaCheck"]);
    }

    #[test]
    fn test_duration() {
        let mut flow = UserFlow::new("corr-1", 0, at(5));
        flow.ended_at = at(35);
        assert_eq!(flow.duration(), chrono::Duration::seconds(30));
    }
}
