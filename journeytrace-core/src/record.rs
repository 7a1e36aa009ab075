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

//! Wire model for captured diagnostic log records.
//!
//! The identity engine emits one [`LogRecord`] per HTTP round-trip, each
//! carrying an ordered sequence of typed entries ("clips"). The shape is
//! fixed by the upstream engine and parsed defensively: unknown clip kinds
//! deserialize to [`Clip::Unknown`], missing optional fields are absent
//! rather than errors, and scalar fields tolerate the engine's habit of
//! stringifying booleans and numbers.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "id": "evt-0001",
//!   "timestamp": "2026-03-01T09:30:00Z",
//!   "correlationId": "b9f3c6e1-6921-4aa3-8a2f-0d2c9e33a001",
//!   "policyId": "B2C_1A_SIGNUP_SIGNIN",
//!   "clips": [
//!     {"Kind": "Headers", "Content": {"CorrelationId": "...", "EventInstance": "Event:AUTH"}},
//!     {"Kind": "Action", "Content": "Web.TPEngine.StateMachineHandlers.OrchestrationManager"},
//!     {"Kind": "HandlerResult", "Content": {"Result": true, "Statebag": {"ORCH_CS": {"v": "1"}}}}
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, TraceError};

/// One captured diagnostic event. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Unique record id assigned by the log store.
    pub id: String,
    /// Capture timestamp; records are ordered by this before grouping.
    pub timestamp: DateTime<Utc>,
    /// Groups records from one browser session. May span several flows.
    pub correlation_id: String,
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub clips: Vec<Clip>,
}

impl LogRecord {
    /// First `Headers` clip of the record, if any.
    pub fn headers(&self) -> Option<&HeadersContent> {
        self.clips.iter().find_map(|clip| match clip {
            Clip::Headers(h) => Some(h),
            _ => None,
        })
    }

    /// Event-instance tag of the round-trip that produced this record.
    pub fn event_instance(&self) -> Option<&EventInstance> {
        self.headers().and_then(|h| h.event_instance.as_ref())
    }
}

/// Parse the upstream wire payload: a JSON array of log records.
///
/// This is the one place where malformed input is a hard error — the basic
/// record shape is a precondition, not a runtime condition the pipeline
/// recovers from.
pub fn parse_records(json: &str) -> Result<Vec<LogRecord>> {
    serde_json::from_str(json).map_err(|e| TraceError::MalformedInput(e.to_string()))
}

/// One typed entry within a log record.
///
/// Adjacently tagged on the wire as `{"Kind": ..., "Content": ...}`. A
/// `HandlerResult` always semantically attaches to the nearest preceding
/// `Action` or `Predicate` clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Kind", content = "Content")]
pub enum Clip {
    /// Round-trip metadata: correlation id, policy, tenant, event instance.
    Headers(HeadersContent),
    /// Names a handler about to execute (namespaced path).
    Action(String),
    /// Names a conditional check about to be evaluated.
    Predicate(String),
    /// Outcome of the most recently named action or predicate.
    HandlerResult(HandlerResultContent),
    /// Catch-all for clip kinds this version does not understand.
    #[serde(other)]
    Unknown,
}

/// Content of a `Headers` clip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadersContent {
    #[serde(rename = "CorrelationId", default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(rename = "EventInstance", default, skip_serializing_if = "Option::is_none")]
    pub event_instance: Option<EventInstance>,
    #[serde(rename = "TenantId", default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(rename = "PolicyId", default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

/// Classification of the HTTP round-trip that produced a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventInstance {
    /// Top-level authorize request.
    Auth,
    /// Backend API call (display controls, validation endpoints).
    Api,
    /// Self-asserted page post-back.
    SelfAsserted,
    /// Federated claims exchange leg.
    ClaimsExchange,
    /// Unrecognized tag, preserved verbatim.
    Other(String),
}

impl EventInstance {
    /// Parse a wire tag, tolerating the `Event:` prefix the engine emits.
    pub fn parse(raw: &str) -> Self {
        let tag = raw.trim();
        let tag = tag.strip_prefix("Event:").unwrap_or(tag);
        match tag {
            "AUTH" => EventInstance::Auth,
            "API" => EventInstance::Api,
            "SELFASSERTED" => EventInstance::SelfAsserted,
            "ClaimsExchange" => EventInstance::ClaimsExchange,
            other => EventInstance::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventInstance::Auth => "AUTH",
            EventInstance::Api => "API",
            EventInstance::SelfAsserted => "SELFASSERTED",
            EventInstance::ClaimsExchange => "ClaimsExchange",
            EventInstance::Other(s) => s,
        }
    }
}

impl From<String> for EventInstance {
    fn from(s: String) -> Self {
        EventInstance::parse(&s)
    }
}

impl From<EventInstance> for String {
    fn from(e: EventInstance) -> Self {
        e.as_str().to_string()
    }
}

impl std::fmt::Display for EventInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of a `HandlerResult` clip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandlerResultContent {
    /// Boolean outcome. The engine sometimes stringifies it.
    #[serde(
        rename = "Result",
        default,
        deserialize_with = "de_boolish",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<bool>,
    /// Incremental statebag patch.
    #[serde(rename = "Statebag", default, skip_serializing_if = "Option::is_none")]
    pub statebag: Option<StatebagPatch>,
    /// Structured payload tree recorded by the handler.
    #[serde(rename = "RecorderRecord", default, skip_serializing_if = "Option::is_none")]
    pub recorder_record: Option<RecorderRecord>,
    /// Exception raised by the handler, when one occurred.
    #[serde(rename = "Exception", default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<HandlerException>,
}

impl HandlerResultContent {
    pub fn succeeded(&self) -> bool {
        self.result.unwrap_or(false)
    }

    /// Statebag value for `key`, when the patch carries it.
    pub fn statebag_value(&self, key: &str) -> Option<&Value> {
        self.statebag.as_ref()?.get(key).map(StatebagEntry::value)
    }

    /// First recorder entry value for `key`, when present.
    pub fn recorder_value(&self, key: &str) -> Option<&Value> {
        self.recorder_record.as_ref()?.first(key)
    }
}

/// Partial key→entry statebag update attached to a handler result.
pub type StatebagPatch = BTreeMap<String, StatebagEntry>;

/// One statebag entry: a value plus bookkeeping the engine attaches to it.
///
/// The canonical wire shape is `{"c": <timestamp>, "k": <key>, "v": <value>,
/// "p": <persisted>}`; a bare value in place of the object is accepted and
/// read as the value itself. An object counts as the entry shape only when
/// it carries at least one bookkeeping key, so object-valued entries like
/// the complex-claims container stay intact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatebagEntry {
    Entry {
        #[serde(rename = "v")]
        value: Value,
        #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
        recorded_at: Option<String>,
        #[serde(rename = "k", skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(rename = "p", skip_serializing_if = "Option::is_none")]
        persisted: Option<bool>,
    },
    Bare(Value),
}

/// Keys whose presence marks an object as the bookkeeping entry shape.
const ENTRY_MARKER_KEYS: [&str; 4] = ["v", "c", "k", "p"];

// Not derived: an untagged derive lets any object satisfy the all-defaulted
// entry arm, which would read a bare object value as an entry with a null
// value.
impl<'de> Deserialize<'de> for StatebagEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct EntryShape {
            #[serde(rename = "v", default)]
            value: Value,
            #[serde(rename = "c", default)]
            recorded_at: Option<String>,
            #[serde(rename = "k", default)]
            key: Option<String>,
            #[serde(rename = "p", default)]
            persisted: Option<bool>,
        }

        let raw = Value::deserialize(deserializer)?;
        let marked = raw
            .as_object()
            .is_some_and(|map| ENTRY_MARKER_KEYS.iter().any(|key| map.contains_key(*key)));
        if !marked {
            return Ok(StatebagEntry::Bare(raw));
        }
        match EntryShape::deserialize(&raw) {
            Ok(shape) => Ok(StatebagEntry::Entry {
                value: shape.value,
                recorded_at: shape.recorded_at,
                key: shape.key,
                persisted: shape.persisted,
            }),
            // Bookkeeping keys with unexpected field types fall back to the
            // bare reading rather than failing the whole record.
            Err(_) => Ok(StatebagEntry::Bare(raw)),
        }
    }
}

impl StatebagEntry {
    /// Shorthand for a canonical entry carrying only a value.
    pub fn of(value: Value) -> Self {
        StatebagEntry::Entry {
            value,
            recorded_at: None,
            key: None,
            persisted: None,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            StatebagEntry::Entry { value, .. } => value,
            StatebagEntry::Bare(value) => value,
        }
    }
}

/// Nested key→value tree carrying structured handler payloads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecorderRecord {
    #[serde(rename = "Values", default)]
    pub values: Vec<RecorderEntry>,
}

impl RecorderRecord {
    /// Value of the first entry with `key`.
    pub fn first(&self, key: &str) -> Option<&Value> {
        self.values.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    /// Values of every entry with `key`, in record order.
    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> {
        self.values.iter().filter(move |e| e.key == key).map(|e| &e.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.iter().any(|e| e.key == key)
    }
}

/// One `{Key, Value}` pair inside a recorder record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", default)]
    pub value: Value,
}

impl RecorderEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self { key: key.into(), value }
    }
}

/// Exception payload attached to a handler result or recorder entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandlerException {
    #[serde(rename = "Kind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(
        rename = "HResult",
        default,
        deserialize_with = "de_stringish",
        skip_serializing_if = "Option::is_none"
    )]
    pub hresult: Option<String>,
    #[serde(rename = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Accept a JSON bool or the engine's `"True"`/`"False"` strings.
fn de_boolish<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Boolish {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Boolish>::deserialize(deserializer)? {
        None => None,
        Some(Boolish::Bool(b)) => Some(b),
        Some(Boolish::Text(s)) => Some(s.eq_ignore_ascii_case("true")),
    })
}

/// Accept a JSON string or number and keep it as a string.
fn de_stringish<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stringish {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Stringish>::deserialize(deserializer)? {
        None => None,
        Some(Stringish::Text(s)) => Some(s),
        Some(Stringish::Number(n)) => Some(n.to_string()),
    })
}
