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

//! Journeytrace Replay
//!
//! The reconstruction pipeline: group raw log records into user flows, then
//! replay one flow's clips through a stateful interpreter to recover its
//! orchestration steps, sub-journey nesting and claims evolution.
//!
//! ```no_run
//! use journeytrace_core::{parse_records, ReplayConfig};
//! use journeytrace_replay::{group_flows, interpret_flow};
//!
//! # fn main() -> journeytrace_core::Result<()> {
//! let records = parse_records(r#"[]"#)?;
//! let config = ReplayConfig::default();
//! for flow in group_flows(&records) {
//!     let trace = interpret_flow(&flow, &records, &config);
//!     println!("{}: {} steps", trace.flow_id, trace.steps.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod grouper;
pub mod interpreter;
pub mod stack;
pub mod statebag;
pub mod tree;

pub use grouper::{group_flows, logs_for_flow};
pub use interpreter::{enrich_flow, interpret_flow, replay_flow, FlowTrace};
pub use stack::{GapResolution, JourneyStack, JourneyStackEntry};
pub use statebag::StatebagAccumulator;
pub use tree::{FlowTreeBuilder, PendingNode};
