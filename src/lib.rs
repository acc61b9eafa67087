//! Generation engine for a node-based canvas: chain execution over a
//! directed node graph, frame-by-frame sequence runs, and the retry, cache,
//! and cross-tab storage plumbing they share.

pub mod abort;
pub mod cache;
pub mod download;
pub mod error;
pub mod images;
pub mod models;
pub mod node_graph;
pub mod ops;
pub mod retry;
pub mod services;
pub mod settings;
pub mod storage;

pub use abort::AbortHandle;
pub use error::EngineError;
pub use node_graph::{ChainDirection, Engine};
pub use services::{GenerationService, HttpGenerationService};
pub use settings::ServiceConfig;
pub use storage::TabStore;
