//! # importcheck Common Library
//!
//! Shared code for the importcheck engine and its tooling:
//! - Common error type
//! - Configuration and root folder resolution
//! - Data-store capability consumed by validation processors
//! - SQLite implementation of the data store

pub mod config;
pub mod db;
pub mod error;

pub use db::{DataStore, QueryOutput, Row, SqlValue, Statement};
pub use error::{Error, Result};
