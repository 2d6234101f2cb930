//! Integration tests for spreadwatch-session.

pub mod common;
