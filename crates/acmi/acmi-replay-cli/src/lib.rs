//! Command-line host for the ACMI replay engine: argument model and report rendering.

pub mod args;
pub mod report;
