//! Alert dispatch.
//!
//! Alerts are best-effort: every delivery attempt yields a [`Delivery`]
//! value and never an error, so a failed notification cannot abort or
//! corrupt a detection run.

mod message;
mod multipart;
mod notifier;
mod telegram;

pub use message::{format_timestamp, local_timestamp, AlertMessage, TIMESTAMP_FORMAT};
pub use multipart::MultipartForm;
pub use notifier::{Delivery, DisabledNotifier, Notifier, RecordedCall, RecordingNotifier};
pub use telegram::{encode_png, TelegramNotifier};
