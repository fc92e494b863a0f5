//! Game-tree search.
//!
//! Fixed-depth minimax that fans out over the rayon pool and hands subtrees
//! past a configured ply to a [`RemoteEvaluator`].

pub mod minimax;
pub mod observer;

pub use minimax::{reduce, FallbackPolicy, RemoteEvaluator, SearchConfig, SearchResult, Searcher};
pub use observer::{NullObserver, SearchObserver, SearchStats, TracingObserver};
