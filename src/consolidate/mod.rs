//! Cross-host consolidation of collated files.
//!
//! Layout under the consolidation root:
//!
//! ```text
//! <consolidation-dir>/<class>/ALL/<path>     merged history of every host
//! <consolidation-dir>/<class>/<host>/<path>  host files already merged
//! <consolidation-dir>/<class>/.pending-finalize
//! <consolidation-dir>/<class>/.tmp/          merge output before its rename
//! ```
//!
//! One consolidation process per class at a time; nothing here locks.

pub mod archive;
pub mod engine;
pub mod journal;

pub use engine::{ConsolidationEngine, ConsolidationStats, Merged};
pub use journal::{MergedSource, PendingFinalize};
