//! Triangular arbitrage scanner and executor for spot CEX venues.
//!
//! A venue-agnostic numeric kernel (edge formula, depth sizing, VWAP
//! slippage) feeds a per-venue attempt/execution engine driven off a
//! websocket-fed order-book cache, with append-only persistence, labelled
//! metrics and rate-limited notifications.

pub mod adapter;
pub mod cli_support;
pub mod config;
pub mod engine;
pub mod errors;
pub mod hybrid;
pub mod kernel;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod stream;
pub mod supervisor;
pub mod triangle;
