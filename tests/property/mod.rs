//! Property-based tests

pub mod config_proptest;
#[cfg(feature = "ssr")]
pub mod spec_proptest;
