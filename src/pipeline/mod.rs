//! The two end-to-end runs: merge a boundary dataset, and hull a walk network.
//!
//! Each pipeline only writes its output after every earlier stage succeeded.

mod boundary;
mod walkable;

pub use boundary::{merge_layer, BoundaryPipeline, BoundarySummary};
pub use walkable::{hull_of_graph, WalkablePipeline, WalkableSummary};
