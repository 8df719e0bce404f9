//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs` — Normalized domain types consumed by callers
//! - `wire.rs` — Raw serde structs matching the exchange's frames
//! - `convert.rs` — `From` conversions from wire to domain
//! - `state.rs` — State containers with update methods (where the data is stateful)

pub mod balance;
pub mod order;
pub mod orderbook;
pub mod position;
pub mod ticker;
pub mod trade;
