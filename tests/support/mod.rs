//! Test support module
//!
//! Shared fixtures and helpers for the integration suites.

#![allow(dead_code)]

pub mod helpers;

// Re-export rstest fixtures for convenient use in tests
pub mod fixtures;
