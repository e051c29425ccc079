//! `stockyard-core`: foundation building blocks shared by the other crates.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};
