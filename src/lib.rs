pub mod calendar;
pub mod config;
pub mod error;
pub mod extraction;
pub mod models;
pub mod startup;
pub mod utils;
#[cfg(feature = "web-interface")]
pub mod web;

pub use error::{CalResult, Error};
pub use extraction::{EventExtractor, Extraction};
pub use models::{EventDateTime, EventRecord, SchemaError};
