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

//! # Journeytrace Query
//!
//! Derived views over finished flow traces: claims diffing with predecessor
//! resolution, a repeated-lookup navigation index, a flat display
//! projection, and a generation-guarded session that keeps slow results
//! from overwriting newer ones.
//!
//! Everything here is side-effect-free over a finished
//! [`FlowTrace`](journeytrace_replay::FlowTrace) except [`AnalysisSession`],
//! which owns a capture and its selection state.
//!
//! ```no_run
//! use journeytrace_core::ReplayConfig;
//! use journeytrace_query::{journey_tree, AnalysisSession};
//!
//! # fn main() -> journeytrace_core::Result<()> {
//! let source = std::fs::read_to_string("capture.json").unwrap();
//! let session = AnalysisSession::from_source(&source, ReplayConfig::default())?;
//! let first = session.flows()[0].id.clone();
//! session.select(&first)?;
//! session.with_selected(|trace, _index| {
//!     for row in journey_tree(trace) {
//!         println!("{}{}", "  ".repeat(row.depth), row.label);
//!     }
//! });
//! # Ok(())
//! # }
//! ```

pub mod diff;
pub mod display;
pub mod navigate;
pub mod session;

pub use diff::{before_claims, compute_claims_diff, ClaimChange, ClaimsDiff};
pub use display::{journey_tree, TreeRow};
pub use navigate::NodeIndex;
pub use session::{AnalysisSession, Generation};
