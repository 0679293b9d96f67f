//! Conversion tests
//!
//! End-to-end runs through the four-phase lifecycle:
//! - COMBINE archive → Research Object bundle
//! - Research Object bundle → COMBINE archive
//! - Round trips in both directions

pub mod tests_ca_to_ro;
pub mod tests_ro_to_ca;
