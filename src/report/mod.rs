//! Reporting utilities: display precision, terminal tables and the
//! deterministic (non-AI) report sections.

pub mod format;
pub mod highlights;

pub use format::*;
pub use highlights::*;
