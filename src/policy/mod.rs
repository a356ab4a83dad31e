//! Package-based exclusion policy.
//!
//! A class may exclude commands by file pattern, by owning package, or by
//! the repositories that package comes from. The rules are evaluated in a
//! fixed order, first match wins:
//!
//! 1. file pattern excluded for the class: excluded
//! 2. path not owned by any package: retained
//! 3. package explicitly included: retained, whatever its repository
//! 4. package explicitly excluded: excluded
//! 5. a source repository excluded: excluded
//! 6. otherwise retained

pub mod classifier;
pub mod package_db;

pub use classifier::{PolicyClassifier, Verdict};
pub use package_db::{PackageDatabase, RpmDatabase};
