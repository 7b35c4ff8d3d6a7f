//! Native engine backends
//!
//! Backends are conditionally compiled based on feature flags.

#[cfg(feature = "engine-leptess")]
pub mod leptess;
