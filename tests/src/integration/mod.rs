//! Cross-component integration tests for the serial bus and channel facade.

pub mod ordering;
