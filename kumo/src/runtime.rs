//! Support code for observing simulation runs.

pub mod tracing;
