//! Integration tests for spreadwatch-ws.

pub mod common;
