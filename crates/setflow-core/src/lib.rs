#![forbid(unsafe_code)]
//! setflow-core: row batches, headers, ids, configuration and the abstract
//! memory budget interface shared by every other crate.
//!
//! Nothing in here performs I/O or hashing; operators and the executor build
//! on top of these plain data types.

pub mod budget;
pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
