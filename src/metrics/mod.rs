//! Metric aggregation.
//!
//! Both collectors push readings into a single [`AggregationTable`]; the
//! exposition endpoint reads snapshots of it.

pub mod table;

pub use table::{AggregationTable, ReadingSender};
