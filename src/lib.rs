//! Emigrant City pipeline library.
//!
//! Three steps turn the crowd-sourced mortgage transcriptions into a graph
//! dataset: [`ingest`] unpacks the published archive into a record store,
//! [`enrich`] normalizes fields and geocodes addresses, and [`emit`] derives
//! document, relation and log items and hands them to an [`emit::ItemWriter`].

pub mod cli;
pub mod config;
pub mod emit;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod geocode;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod store;

pub use error::{PipelineError, Result};
