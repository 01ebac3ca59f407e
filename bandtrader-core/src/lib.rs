//! bandtrader core: a single-instrument signal and execution engine.
//!
//! - Domain types (bars, quotes, positions, signals, instrument metadata)
//! - Causal indicators used by the replay feed
//! - Market data and execution backend ports, with replay/snapshot feeds
//!   and an in-memory paper broker
//! - The tick engine: aggregator, detectors, arbiter, sizer, executor and
//!   trailing stops
//! - Configuration, fingerprinting and bar loading

pub mod broker;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod market;

pub use config::EngineConfig;
pub use engine::{Engine, EngineError, TickOutcome, TickReport};
