//! Driveferry bot
//!
//! Wires configuration, the Telegram adapter, the destination backend and the
//! upload pipeline together, and dispatches incoming updates.

pub mod app;
pub mod dispatch;
pub mod telemetry;

pub use app::{build_dispatcher, open_ledger};
pub use dispatch::{poll_updates, DispatchSettings, Dispatcher};
pub use telemetry::init_tracing;
