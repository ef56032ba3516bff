//! # Infrastructure Layer
//!
//! Storage backends, the order repository built on them, configuration
//! and logging setup.

pub mod config;
pub mod kv;
pub mod persistence;
pub mod telemetry;
