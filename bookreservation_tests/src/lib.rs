//! End to end tests for the book reservation service.
//! They expect a deployed instance and are gated behind features so that
//! a plain `cargo test` does not try to reach one.
