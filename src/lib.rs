//! smart-money: classifies large-participant behaviour into market phases
//!
//! This library provides the core components for:
//! - Trade-stream aggregation into smoothed directional flow (delta)
//! - Large resting order tracking and classification
//! - Rolling z-score normalisation of OBI, CVD, OI and volume
//! - Weighted fusion of order and indicator signals
//! - Candidate/confirm phase state machine with hysteresis
//! - Cooldown gating of downstream actions
//! - Live trade feed and REST snapshot clients for Binance futures
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod cooldown;
pub mod delta;
pub mod engine;
pub mod exchange;
pub mod feed;
pub mod indicators;
pub mod integrator;
pub mod orders;
pub mod phase;
pub mod telemetry;
pub mod ws;
