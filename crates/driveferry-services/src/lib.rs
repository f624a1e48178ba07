//! Driveferry Services Layer
//!
//! This crate hosts the upload pipeline: the [`TransferEngine`] that stages
//! and pushes files, the [`UploadLedger`] that records completed uploads, and
//! the [`UploadOrchestrator`] that sequences one job from validation to
//! cleanup. Rendering of user-facing texts lives here too, so adapters only
//! deliver strings.

pub mod history;
pub mod ledger;
pub mod messages;
pub mod orchestrator;
pub mod progress;
pub mod transfer;

pub use history::render_history;
pub use ledger::{JsonLedger, LedgerError, UploadLedger};
pub use orchestrator::{JobReport, JobState, OrchestratorSettings, UploadJob, UploadOrchestrator};
pub use progress::ProgressThrottle;
pub use transfer::{DownloadError, TransferEngine};
