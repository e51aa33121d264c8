//! Shared fixtures for the integration test binaries under `tests/`.

pub mod common;
