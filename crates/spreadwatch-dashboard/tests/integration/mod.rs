//! Integration tests for spreadwatch-dashboard.

pub mod common;
