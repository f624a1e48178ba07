//! Data models for the upload pipeline
//!
//! Each sub-module covers one stage: what arrives from the messaging side,
//! what travels to the destination, and what is recorded afterwards.

mod inbound;
mod ledger;
mod transfer;

pub use inbound::*;
pub use ledger::*;
pub use transfer::*;
