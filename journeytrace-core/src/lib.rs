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

//! Journeytrace Core
//!
//! Data model for identity-journey trace reconstruction: the diagnostic-log
//! wire shapes, the well-known engine keys and their extractors, and the
//! derived flow / step / tree types the replay pipeline produces.

pub mod config;
pub mod error;
pub mod flow;
pub mod keys;
pub mod node;
pub mod record;
pub mod step;

pub use config::{ClaimsFilter, ReplayConfig};
pub use error::{Result, TraceError};
pub use flow::UserFlow;
pub use keys::ResolvedIdentity;
pub use node::{FlowNode, FlowNodeKind, NodeContext};
pub use record::{
    parse_records, Clip, EventInstance, HandlerException, HandlerResultContent, HeadersContent,
    LogRecord, RecorderEntry, RecorderRecord, StatebagEntry, StatebagPatch,
};
pub use step::{
    ClaimsTransformation, DisplayControlAction, StepResult, TechnicalProfile, TraceStep,
};
