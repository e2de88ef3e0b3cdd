//! Autonomous credit operating graph.
//!
//! Ingests borrower, asset, covenant and telemetry records into an in-memory
//! graph, scores every borrower on four risk signals, and tunes the signal
//! weights from human feedback.

pub mod dispatch;
pub mod error;
pub mod graph;
pub mod state;
pub mod types;

pub use error::{GraphError, GraphResult};
pub use graph::CreditGraph;
pub use types::GraphConfig;
