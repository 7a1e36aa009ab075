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

//! Finalized orchestration steps and the entities they own.
//!
//! A [`TraceStep`] is assembled incrementally while the interpreter walks a
//! flow's clips and frozen at the step boundary. Insertion helpers keep set
//! semantics (an entity reported through several recorder paths lands once)
//! while preserving first-appearance order for iteration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keys::claim_string;
use crate::record::EventInstance;

/// Outcome of one orchestration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    Success,
    Error,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Success => write!(f, "Success"),
            StepResult::Error => write!(f, "Error"),
        }
    }
}

/// A technical profile invoked during a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalProfile {
    pub id: String,
    /// Provider type reported by the engine, e.g. a directory, REST,
    /// claims-transformation or federated-protocol provider.
    pub provider_type: Option<String>,
    /// Set when the exchange ran server-side rather than via a redirect.
    pub backend: bool,
    /// Id of the display control this profile executed under, if any.
    pub display_control: Option<String>,
}

impl TechnicalProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), provider_type: None, backend: false, display_control: None }
    }

    /// Parse an `InitiatingClaimsExchange`-family recorder payload:
    /// `{TechnicalProfileId, ProtocolProviderType}`.
    pub fn from_claims_exchange(value: &Value, backend: bool) -> Option<Self> {
        let map = value.as_object()?;
        let id = map.get("TechnicalProfileId").and_then(Value::as_str).filter(|s| !s.is_empty())?;
        let provider_type = map
            .get("ProtocolProviderType")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Some(Self { id: id.to_string(), provider_type, backend, display_control: None })
    }

    /// Fold another sighting of the same profile into this one, filling
    /// fields the earlier sighting did not know.
    pub fn merge(&mut self, other: &TechnicalProfile) {
        if self.provider_type.is_none() {
            self.provider_type = other.provider_type.clone();
        }
        self.backend |= other.backend;
        if self.display_control.is_none() {
            self.display_control = other.display_control.clone();
        }
    }
}

/// A claims transformation reported by the recorder, with its input and
/// output claim values rendered as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsTransformation {
    pub id: String,
    pub input_claims: BTreeMap<String, String>,
    pub output_claims: BTreeMap<String, String>,
}

impl ClaimsTransformation {
    /// Parse a `ClaimsTransformation` recorder payload:
    /// `{Id, InputClaims, OutputClaims}`, where each claims collection is
    /// either a key→value object or an array of `{ClaimTypeId|Id|Key, Value}`.
    pub fn from_recorder_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let id = map.get("Id").and_then(Value::as_str).filter(|s| !s.is_empty())?;
        Some(Self {
            id: id.to_string(),
            input_claims: claims_map(map.get("InputClaims")),
            output_claims: claims_map(map.get("OutputClaims")),
        })
    }
}

/// One action taken against a display control, with whatever technical
/// profiles and transformations ran under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayControlAction {
    pub id: String,
    pub action: Option<String>,
    pub technical_profiles: Vec<TechnicalProfile>,
    pub claims_transformations: Vec<ClaimsTransformation>,
}

impl DisplayControlAction {
    /// Parse a `DisplayControlAction` recorder payload:
    /// `{DisplayControlId|Id, Action}`.
    pub fn from_recorder_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let id = map
            .get("DisplayControlId")
            .or_else(|| map.get("Id"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())?;
        let action = map
            .get("Action")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Some(Self {
            id: id.to_string(),
            action,
            technical_profiles: Vec::new(),
            claims_transformations: Vec::new(),
        })
    }
}

/// Render a claims collection as an ordered key→string map.
fn claims_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let mut claims = BTreeMap::new();
    match value {
        Some(Value::Object(map)) => {
            for (key, v) in map {
                claims.insert(key.clone(), claim_string(v));
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                let Some(map) = item.as_object() else { continue };
                let key = map
                    .get("ClaimTypeId")
                    .or_else(|| map.get("Id"))
                    .or_else(|| map.get("Key"))
                    .and_then(Value::as_str);
                if let Some(key) = key {
                    let v = map.get("Value").unwrap_or(&Value::Null);
                    claims.insert(key.to_string(), claim_string(v));
                }
            }
        }
        _ => {}
    }
    claims
}

/// One finalized orchestration step.
///
/// Created exactly once when the interpreter crosses a step boundary; the
/// statebag and claims snapshots are frozen copies taken at finalization and
/// never alias the live accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    /// Global ordering across the whole flow, matching array position.
    pub sequence: u32,
    /// Id of the log record whose clips opened this step.
    pub log_id: String,
    pub event_instance: Option<EventInstance>,
    /// Id of the journey-stack level that owns this step.
    pub journey_id: String,
    pub journey_name: String,
    /// The `ORCH_CS` value this step executed as, within its journey.
    pub order: u32,
    pub result: StepResult,
    /// Statebag as of the end of this step.
    pub statebag: BTreeMap<String, Value>,
    /// Claims view as of the end of this step.
    pub claims: BTreeMap<String, String>,
    pub technical_profile_names: Vec<String>,
    pub technical_profiles: Vec<TechnicalProfile>,
    pub claims_transformation_ids: Vec<String>,
    pub claims_transformations: Vec<ClaimsTransformation>,
    /// Candidate technical-profile ids offered by an HRD screen.
    pub selectable_options: Vec<String>,
    /// The option the user picked, attached to the step that offered it.
    pub selected_option: Option<String>,
    pub display_controls: Vec<DisplayControlAction>,
    pub validation_profiles: Vec<String>,
    pub error_message: Option<String>,
    pub error_hresult: Option<String>,
    /// Strictly more than one selectable option was offered.
    pub interactive: bool,
    pub final_step: bool,
}

impl TraceStep {
    pub fn new(
        sequence: u32,
        log_id: impl Into<String>,
        journey_id: impl Into<String>,
        journey_name: impl Into<String>,
        order: u32,
    ) -> Self {
        Self {
            sequence,
            log_id: log_id.into(),
            event_instance: None,
            journey_id: journey_id.into(),
            journey_name: journey_name.into(),
            order,
            result: StepResult::Success,
            statebag: BTreeMap::new(),
            claims: BTreeMap::new(),
            technical_profile_names: Vec::new(),
            technical_profiles: Vec::new(),
            claims_transformation_ids: Vec::new(),
            claims_transformations: Vec::new(),
            selectable_options: Vec::new(),
            selected_option: None,
            display_controls: Vec::new(),
            validation_profiles: Vec::new(),
            error_message: None,
            error_hresult: None,
            interactive: false,
            final_step: false,
        }
    }

    pub fn is_error(&self) -> bool {
        self.result == StepResult::Error
    }

    /// Record a technical-profile id without detail.
    pub fn note_profile_name(&mut self, id: &str) {
        if !id.is_empty() && !self.technical_profile_names.iter().any(|n| n == id) {
            self.technical_profile_names.push(id.to_string());
        }
    }

    /// Record a technical profile with detail, merging with an earlier
    /// sighting of the same id.
    pub fn add_technical_profile(&mut self, profile: TechnicalProfile) {
        self.note_profile_name(&profile.id);
        match self.technical_profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => existing.merge(&profile),
            None => self.technical_profiles.push(profile),
        }
    }

    pub fn add_claims_transformation(&mut self, transformation: ClaimsTransformation) {
        if self.claims_transformation_ids.iter().any(|id| id == &transformation.id) {
            return;
        }
        self.claims_transformation_ids.push(transformation.id.clone());
        self.claims_transformations.push(transformation);
    }

    /// Replace the selectable options with an HRD candidate list; the step
    /// is interactive exactly when more than one candidate is offered.
    pub fn set_selectable_options(&mut self, options: Vec<String>) {
        self.interactive = options.len() > 1;
        self.selectable_options = options;
    }

    pub fn note_validation_profile(&mut self, id: &str) {
        if !id.is_empty() && !self.validation_profiles.iter().any(|p| p == id) {
            self.validation_profiles.push(id.to_string());
        }
        // Validation profiles execute as part of the step, so they appear in
        // the invoked-profile list as well.
        self.note_profile_name(id);
    }

    /// Mark the step failed, keeping the first error seen.
    pub fn mark_error(&mut self, message: Option<&str>, hresult: Option<&str>) {
        self.result = StepResult::Error;
        if self.error_message.is_none() {
            self.error_message = message.filter(|s| !s.is_empty()).map(str::to_string);
        }
        if self.error_hresult.is_none() {
            self.error_hresult = hresult.filter(|s| !s.is_empty()).map(str::to_string);
        }
    }
}
