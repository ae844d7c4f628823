//! Metrics core: merge, per-row metrics and aggregation.
//!
//! All three are stateless transformations; the orchestrator sequences them.

pub mod aggregate;
pub mod merge;
pub mod metrics;

pub use aggregate::*;
pub use merge::*;
pub use metrics::*;
