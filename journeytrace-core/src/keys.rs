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

//! Well-known statebag keys, recorder keys and handler names, plus the pure
//! extractors over them.
//!
//! Everything here is stateless: classification of handler paths, and
//! best-effort extraction of typed values out of the loosely-shaped payloads
//! the engine records. Extractors return `None` (or an empty list) on shapes
//! they do not recognize; deciding whether that is an anomaly is the
//! caller's job.

use serde_json::Value;

// ---------------------------------------------------------------------------
// Statebag keys
// ---------------------------------------------------------------------------

/// Orchestration current step — the primary step-boundary signal.
pub const SB_ORCHESTRATION_STEP: &str = "ORCH_CS";
/// Current technical profile, format `<id>:<step>`.
pub const SB_CURRENT_TECHNICAL_PROFILE: &str = "CTP";
/// Target claims-exchange id selected interactively in an HRD step.
pub const SB_TARGET_CLAIMS_EXCHANGE: &str = "TAGE";
/// Engine state-machine state.
pub const SB_MACHINE_STATE: &str = "MACHSTATE";
/// Complex-claims container object holding resolved user claims.
pub const SB_COMPLEX_CLAIMS: &str = "Complex-CLMS";
/// Cancellation marker set when the user abandons an interactive step.
pub const SB_IS_CANCELLED: &str = "IsCancelled";

// ---------------------------------------------------------------------------
// Recorder-record keys
// ---------------------------------------------------------------------------

pub const REC_INITIATING_CLAIMS_EXCHANGE: &str = "InitiatingClaimsExchange";
pub const REC_INITIATING_BACKEND_CLAIMS_EXCHANGE: &str = "InitiatingBackendClaimsExchange";
pub const REC_ENABLED_FOR_USER_JOURNEYS: &str = "EnabledForUserJourneysTrue";
pub const REC_HOME_REALM_DISCOVERY: &str = "HomeRealmDiscovery";
pub const REC_SUB_JOURNEY_INVOKED: &str = "SubJourneyInvoked";
pub const REC_SUB_JOURNEY: &str = "SubJourney";
pub const REC_JOURNEY_COMPLETED: &str = "JourneyCompleted";
pub const REC_CLAIMS_TRANSFORMATION: &str = "ClaimsTransformation";
pub const REC_DISPLAY_CONTROL_ACTION: &str = "DisplayControlAction";
pub const REC_VALIDATION_TECHNICAL_PROFILE: &str = "ValidationTechnicalProfile";
pub const REC_SEND_CLAIMS: &str = "SendClaims";
pub const REC_API_RESULT: &str = "ApiResult";
pub const REC_EXCEPTION: &str = "Exception";

// ---------------------------------------------------------------------------
// Handler names
// ---------------------------------------------------------------------------

/// Drives step transitions; every invocation is a potential step boundary.
pub const HANDLER_ORCHESTRATION_MANAGER: &str = "OrchestrationManager";
/// Invokes a sub-journey; resets the step counter without restarting the flow.
pub const HANDLER_ENQUEUE_NEW_JOURNEY: &str = "EnqueueNewJourneyHandler";
/// Validates a self-asserted page post-back; failures carry the exception.
pub const HANDLER_SELF_ASSERTED_VALIDATION: &str = "SelfAssertedMessageValidationHandler";
/// Predicate guarding whether a technical profile participates in a journey.
pub const PREDICATE_TECHNICAL_PROFILE_ENABLED: &str = "TechnicalProfileEnabled";

/// Trailing segment of a namespaced handler path.
pub fn handler_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

pub fn is_orchestration_manager(path: &str) -> bool {
    handler_name(path) == HANDLER_ORCHESTRATION_MANAGER
}

pub fn is_enqueue_new_journey(path: &str) -> bool {
    handler_name(path) == HANDLER_ENQUEUE_NEW_JOURNEY
}

/// The send-claims family covers every issuance handler variant, so this
/// matches on the name fragment rather than one exact handler.
pub fn is_send_claims(path: &str) -> bool {
    handler_name(path).contains("SendClaims")
}

pub fn is_self_asserted_validation(path: &str) -> bool {
    handler_name(path) == HANDLER_SELF_ASSERTED_VALIDATION
}

pub fn is_technical_profile_enabled(path: &str) -> bool {
    handler_name(path) == PREDICATE_TECHNICAL_PROFILE_ENABLED
}

// ---------------------------------------------------------------------------
// Value extractors
// ---------------------------------------------------------------------------

/// Numeric orchestration step out of an `ORCH_CS` statebag value.
///
/// The engine writes it as a string; a plain number is accepted too.
pub fn orchestration_step(value: &Value) -> Option<u32> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        _ => None,
    }
}

/// Technical-profile id out of a `CTP` value, with the `:<step>` suffix
/// stripped. A value without a numeric suffix is returned whole.
pub fn ctp_profile_id(value: &Value) -> Option<&str> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.rsplit_once(':') {
        Some((id, step)) if step.chars().all(|c| c.is_ascii_digit()) && !id.is_empty() => Some(id),
        _ => Some(raw),
    }
}

/// Candidate technical-profile ids out of an HRD recorder entry.
///
/// Recognized shapes: an array of id strings, an array of
/// `{TechnicalProfileId}` objects, or an object wrapping either under
/// `Values`. `None` means the shape was not recognized at all.
pub fn technical_profile_candidates(value: &Value) -> Option<Vec<String>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("Values") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(id) if !id.is_empty() => candidates.push(id.clone()),
            Value::Object(map) => match map.get("TechnicalProfileId").and_then(Value::as_str) {
                Some(id) if !id.is_empty() => candidates.push(id.to_string()),
                _ => return None,
            },
            _ => return None,
        }
    }
    Some(candidates)
}

/// Sub-journey id out of a `SubJourneyInvoked`/`SubJourney` recorder entry.
pub fn sub_journey_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(map) => map
            .get("SubJourneyId")
            .or_else(|| map.get("Id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Technical-profile id out of a `ValidationTechnicalProfile` entry.
pub fn validation_profile_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(map) => map
            .get("TechnicalProfileId")
            .or_else(|| map.get("Id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// `true` for JSON `true` or the engine's `"True"` string.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Cancellation signal inside an `ApiResult` recorder entry: either an
/// `IsCancelled` field or an `IsCancelled=True` fragment in a raw string.
pub fn api_result_cancelled(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.get(SB_IS_CANCELLED).is_some_and(truthy),
        Value::String(s) => s.contains("IsCancelled=True"),
        _ => false,
    }
}

/// User identity resolved out of the complex-claims container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub email: Option<String>,
    pub object_id: Option<String>,
}

impl ResolvedIdentity {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.object_id.is_none()
    }
}

/// Claim ids checked, in order, when resolving the user's email.
pub const EMAIL_CLAIM_CANDIDATES: [&str; 3] = ["signInName", "email", "signInNames.emailAddress"];
/// Claim id carrying the directory object id.
pub const OBJECT_ID_CLAIM: &str = "objectId";

/// Sign-in name and object id out of a `Complex-CLMS` statebag value.
pub fn resolved_identity(complex_claims: &Value) -> ResolvedIdentity {
    let Value::Object(map) = complex_claims else {
        return ResolvedIdentity::default();
    };

    let email = EMAIL_CLAIM_CANDIDATES
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let object_id = map
        .get(OBJECT_ID_CLAIM)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    ResolvedIdentity { email, object_id }
}

/// Render a claim value the way the claims view exposes it: strings
/// verbatim, scalars via display, composites as compact JSON.
pub fn claim_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        composite => composite.to_string(),
    }
}
