//! pairvault - A review store for paired code/render artifacts.
//!
//! This library ingests ZIP archives of paired artifacts (one code file plus
//! one render file per shared base identifier), persists them in a local
//! SQLite store, and reconstructs joined review records for comparison work.
//!
//! # Modules
//!
//! - [`commands`] - High-level operations (import, list, show, mark, comment, reset)
//! - [`ingest`] - Archive validation, grouping and import pipeline
//! - [`store`] - Typed table gateway over the SQLite store
//! - [`config`] - Configuration loading
//! - [`cli`] - Command-line interface definitions

pub mod cli;
pub mod commands;
pub mod config;
pub mod ingest;
pub mod store;
