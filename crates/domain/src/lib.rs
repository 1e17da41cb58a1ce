#![forbid(unsafe_code)]

pub mod alert;
pub mod analysis;
pub mod ingest;
pub mod stats;
