//! Shared test helpers.

pub mod container_fixtures;
pub mod conversion_helpers;
