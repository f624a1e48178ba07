//! Telegram Bot API adapter
//!
//! [`TelegramClient`] speaks the subset of the Bot API the relay needs:
//! long-polling for updates, resolving and downloading files, and posting or
//! editing plain-text messages. It implements the [`FileSource`] and
//! [`Notifier`] ports from `driveferry-core`, so the upload pipeline never
//! sees Telegram types.
//!
//! [`FileSource`]: driveferry_core::FileSource
//! [`Notifier`]: driveferry_core::Notifier

pub mod client;
pub mod types;

pub use client::{TelegramClient, TelegramError, DEFAULT_API_URL};
pub use types::{Chat, Command, Message, Update, User};
