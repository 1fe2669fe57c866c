//! Query document formats.

pub mod yaml;
