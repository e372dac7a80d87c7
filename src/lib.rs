//! markcore: name/keyword highlighting engine.
//!
//! Scans a host-owned, hierarchical text document for configured name and
//! keyword patterns and wraps matches in reversible annotation markers.
//! Non-matching content is never altered; excluded regions (code blocks,
//! form inputs, editable areas, existing markers) are never read or
//! mutated; clearing all markers restores the original text exactly.
//!
//! # Architecture
//!
//! ## Scanner pipeline
//! - `scanner/compiler.rs` - configuration snapshot → per-class term sets
//!   (Aho-Corasick fast path, regex alternation for wildcard terms)
//! - `scanner/fragments.rs` - document tree → logical buffer + fragment table
//! - `scanner/resolver.rs` - term sets + buffer → conflict-free match list
//! - `scanner/applier.rs` - matches → structural edits, and the inverse clear
//! - `scanner/engine.rs` - RefreshEngine: clear-then-rebuild passes with
//!   trigger coalescing
//!
//! ## Host boundary
//! - `config.rs` - store snapshot schema with defaults, CSV name import
//! - `dom.rs` - arena document tree the host builds and the engine mutates
//!
//! # Usage
//! ```rust
//! use markcore::{Config, Document, NameEntry, NameGroup, RefreshEngine};
//!
//! let mut doc = Document::new();
//! let root = doc.root();
//! let p = doc.append_element(root, "p");
//! doc.append_text(p, "Smith, John arrived. Later, Smith left.");
//!
//! let config = Config {
//!     name_groups: vec![NameGroup::new("Team", vec![NameEntry::new("John", "Smith")])],
//!     ..Config::default()
//! };
//! let mut engine = RefreshEngine::new(config);
//! let stats = engine.refresh(&mut doc).unwrap();
//! assert_eq!(stats.full_matches, 1);
//! assert_eq!(stats.last_matches, 1);
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod scanner;

pub use config::*;
pub use dom::*;
pub use error::*;
pub use scanner::*;
