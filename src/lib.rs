// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod archive;
pub mod config;
pub mod error;
pub mod ingest;
pub mod localtime;
pub mod notify;
pub mod runtime;
pub mod scheduler;
pub mod sink;
pub mod translate;

pub use crate::error::{DigestError, Result};
pub use crate::ingest::filter::{DateWindow, RunParams};
pub use crate::ingest::{DailyIngest, RunSummary};
pub use crate::runtime::DigestRuntime;
