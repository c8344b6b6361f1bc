//! Domain layer - pure types and rules, no I/O.

pub mod billing;
pub mod foundation;
pub mod gateway;
