#![forbid(unsafe_code)]

pub mod analysis_service;
pub mod ingest_pipeline;
pub mod ingest_runner;
pub mod retry;
