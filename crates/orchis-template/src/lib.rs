//! Template resolution.
//!
//! Job inputs, iteration targets and workflow outputs are JSON trees whose
//! string leaves may embed `${dot.separated.path}` references. References are
//! resolved against a [`Scope`], normally the results registry of a run:
//!
//! ```json
//! {
//!   "table": "${init.table}",
//!   "label": "clip-${iterate.index}",
//!   "first": "${inputs.clips.0}"
//! }
//! ```
//!
//! - A string that is exactly one reference resolves to the referenced value
//!   with its type preserved (`"${init.table}"` can yield an object).
//! - Any other string with references resolves to a string, with each value
//!   stringified (see [`stringify`]) and substituted.
//! - Strings without references are returned unchanged.
//!
//! Resolution failures are reported as [`DependencyError`]s carrying the full
//! path, the segment that failed and the keys available at that point.

mod resolve;
mod scope;

pub use orchis_error::DependencyError;
pub use resolve::{references, resolve_path, resolve_template, resolve_value, stringify, type_name};
pub use scope::{Overlay, Scope};
