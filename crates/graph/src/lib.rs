//! # Codemap Graph
//!
//! Dependency linking over extracted file records: specifier resolution,
//! the bidirectional import graph, and the bounded related-files query.
//!
//! ## Architecture
//!
//! ```text
//! FileRecord map
//!     │
//!     ├──> Path Resolver
//!     │      ├─ internal-prefix test (./ ../ /)
//!     │      ├─ candidates: literal → +ext → /index.ext
//!     │      └─ membership against the record set (no filesystem)
//!     │
//!     └──> Dependency Graph (petgraph)
//!            ├─ Nodes: relative file paths
//!            ├─ Edges: resolved imports (forward + derived reverse)
//!            └─ related_files: bounded bidirectional BFS
//! ```
//!
//! The graph is derived state. It is rebuilt from scratch after every batch of
//! record changes and never persisted; only the records are.

mod graph;
mod resolve;

pub use graph::DependencyGraph;
pub use resolve::{candidates, is_internal, resolve};
