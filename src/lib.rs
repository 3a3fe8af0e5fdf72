//! An in-memory ordered index keyed by `i64`.
//!
//! This crate provides [`LacedTree`], a B+ tree mapping 64-bit signed keys to
//! opaque pointer-sized values, with three augmentations layered on top of the
//! textbook structure:
//!
//! - **Parent back-references** - every non-root node links to its parent, so
//!   separator and minimum maintenance ascend directly instead of re-walking
//!   from the root
//! - **Per-level sibling lists** - every level, not just the leaves, is
//!   threaded into a doubly-linked list
//! - **Cached subtree minima** - internal nodes cache the smallest key below
//!   them, letting descent fail fast at the left edge
//!
//! Separator keys are per-child subtree *maxima*: an internal node stores one
//! `(max_key, child)` entry per child.
//!
//! # Example
//!
//! ```
//! use laced_tree::LacedTree;
//!
//! let mut index = LacedTree::new();
//!
//! // Insert fails on duplicates, upsert overwrites.
//! assert!(!index.insert(30, "thirty").at_end());
//! assert!(index.insert(30, "ignored").at_end());
//! index.upsert(10, "ten");
//! index.upsert(20, "twenty");
//!
//! assert_eq!(index.find(20).value(), Some(&"twenty"));
//! assert!(index.find(25).at_end());
//!
//! let mut keys = Vec::new();
//! index.collect_keys(&mut keys, false);
//! assert_eq!(keys, [10, 20, 30]);
//!
//! assert!(index.remove(20));
//! assert!(!index.remove(20));
//! assert_eq!(index.len(), 2);
//! ```
//!
//! # Limits
//!
//! The tree is a single-threaded structure by design: the back-references and
//! sibling lists make structural updates locally cheap and concurrent
//! mutation impractical. Handles returned by point operations capture a value
//! reference and an end marker, nothing else; they are not cursors and do not
//! survive mutation. Only key enumeration is offered for traversal.

#![no_std]
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]

extern crate alloc;

mod raw;

pub mod tree;

pub use tree::{Handle, LacedTree};
