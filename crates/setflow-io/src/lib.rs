#![forbid(unsafe_code)]
//! setflow-io: CSV sources and CSV/NDJSON sinks for row batches.
//!
//! Readers are typed by a header and chunk their input into batches of at
//! most `batch_rows` rows. Writers accept batches one at a time, zero-row
//! batches included.

pub mod error;
pub mod readers;
pub mod writers;

pub use error::{IoError, Result};
pub use readers::csv::{read_csv_path, CsvReader};
pub use writers::csv::CsvWriter;
pub use writers::jsonl::JsonlWriter;
