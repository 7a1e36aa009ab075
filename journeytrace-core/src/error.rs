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

//! Error types for the trace reconstruction pipeline.
//!
//! Replay itself never fails: anomalies inside a flow are recovered locally
//! and reported through the flow-scoped `errors` list. `TraceError` covers
//! caller-contract violations only — input that does not satisfy the basic
//! `LogRecord` shape, or lookups against ids that do not exist.

use thiserror::Error;

/// Result type for journeytrace operations.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors surfaced to callers of the pipeline.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Malformed log input: {0}")]
    MalformedInput(String),

    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Flow has no log records: {0}")]
    EmptyFlow(String),
}

impl From<serde_json::Error> for TraceError {
    fn from(e: serde_json::Error) -> Self {
        TraceError::MalformedInput(e.to_string())
    }
}
