//! SRTLA CLI Library
//!
//! Shared functionality for the SRTLA command-line tools.

pub mod config;

pub use config::{ReceiverConfig, ConfigError, DEFAULT_SRTLA_PORT, DEFAULT_SRT_HOST};
