// src/merge/mod.rs

pub mod consolidate;
pub mod prefix;

pub use consolidate::{consolidate, count_lines, MergeResult, MergeSummary};
pub use prefix::normalize;
