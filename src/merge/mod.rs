//! Ordered merge of key-sorted line streams.
//!
//! Consolidation merges one collated file per host plus the previously
//! consolidated file into a single timeline. Every input is already sorted
//! by its leading timestamp, so a balanced tournament tree yields the
//! global order lazily with O(log n) work per line.
//!
//! ```
//! use snoopy_log_collator::merge::{KeyedReader, MergeTree};
//! use std::io::Cursor;
//!
//! let mut tree = MergeTree::new();
//! tree.insert(KeyedReader::new("a", Cursor::new("20230101-00:00:02 a\n")).unwrap());
//! tree.insert(KeyedReader::new("b", Cursor::new("20230101-00:00:01 b\n")).unwrap());
//!
//! let lines: Vec<String> = tree.by_ref().collect::<Result<_, _>>().unwrap();
//! assert_eq!(lines, vec!["20230101-00:00:01 b", "20230101-00:00:02 a"]);
//! assert_eq!(tree.last_key(), Some("20230101-00:00:02"));
//! ```

pub mod keyed_reader;
pub mod tree;

pub use keyed_reader::{line_key, KeyedReader};
pub use tree::MergeTree;
