// src/engine/mod.rs

pub mod aggregator;
pub mod recorder;
pub mod sequencer;
pub mod session;
pub mod subtest;
pub mod ticker;
pub mod timer;

pub use session::SimulationEngine;
