//! `campaign-insights` library crate.
//!
//! The binary (`insight`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes
//! - the AI, chart and document collaborators can be swapped behind traits
//! - code stays easy to navigate as the project grows

pub mod ai;
pub mod analytics;
pub mod app;
pub mod charts;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod io;
pub mod render;
pub mod report;
