//! Streaming readers that produce bounded `RowBatch` chunks.

pub mod csv;
