//! Integration tests for spreadwatch-api.

pub mod common;
