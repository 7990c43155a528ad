//! Ownership graph construction from path strings
//!
//! Graphs built here come from pre-computed ownership path strings. Graphs
//! built from the live relation come from `crate::traversal`.

pub mod builder;

pub use builder::{build_asset_graph, GraphBuilder};
