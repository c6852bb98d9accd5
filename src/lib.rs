//! Sense HAT weather station core.
//!
//! The pipeline is one-directional: the sampling loop feeds per-metric ring
//! buffers, smoothed values are periodically appended to a shared JSON store
//! file, and any external consumer reads that file back through the retrying
//! reader and the time-series extractor. The LED matrix is driven from the
//! same smoothed values, independent of persistence.

pub mod buffer;
pub mod config;
pub mod display;
pub mod hal;
pub mod sampler;
pub mod series;
pub mod store;
