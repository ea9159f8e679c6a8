//! Fixed-cadence sampling loop
//!
//! Drives the read-publish cycle and chooses between the persistent channel
//! and the fallback publisher on every cycle.

mod controller;

pub use controller::SamplingLoop;
