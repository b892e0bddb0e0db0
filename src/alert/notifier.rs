use std::cell::RefCell;

use image::DynamicImage;
use serde::Serialize;

/// Outcome of one best-effort notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Delivery {
    Sent,
    Failed { reason: String },
}

impl Delivery {
    pub fn failed(reason: impl Into<String>) -> Self {
        Delivery::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

/// Notify capability: a text message and a photo with caption.
///
/// Implementations never return errors; a failed delivery is reported as
/// [`Delivery::Failed`] so that alerting cannot abort a detection run.
pub trait Notifier {
    fn send_message(&self, text: &str) -> Delivery;

    fn send_photo(&self, image: &DynamicImage, caption: &str) -> Delivery;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn send_message(&self, text: &str) -> Delivery {
        (**self).send_message(text)
    }

    fn send_photo(&self, image: &DynamicImage, caption: &str) -> Delivery {
        (**self).send_photo(image, caption)
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn send_message(&self, text: &str) -> Delivery {
        (**self).send_message(text)
    }

    fn send_photo(&self, image: &DynamicImage, caption: &str) -> Delivery {
        (**self).send_photo(image, caption)
    }
}

/// Notifier used when alerting is switched off or not configured.
#[derive(Clone, Debug, Default)]
pub struct DisabledNotifier {
    reason: String,
}

impl DisabledNotifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Notifier for DisabledNotifier {
    fn send_message(&self, _text: &str) -> Delivery {
        Delivery::failed(self.reason())
    }

    fn send_photo(&self, _image: &DynamicImage, _caption: &str) -> Delivery {
        Delivery::failed(self.reason())
    }
}

impl DisabledNotifier {
    fn reason(&self) -> String {
        if self.reason.is_empty() {
            "alerts disabled".to_string()
        } else {
            format!("alerts disabled: {}", self.reason)
        }
    }
}

/// A call captured by [`RecordingNotifier`].
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCall {
    Message {
        text: String,
    },
    Photo {
        caption: String,
        width: u32,
        height: u32,
    },
}

/// Test double that records calls instead of performing network I/O.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: RefCell<Vec<RecordedCall>>,
    fail_with: Option<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls but report every delivery as failed.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Message { text } => Some(text.clone()),
                RecordedCall::Photo { .. } => None,
            })
            .collect()
    }

    pub fn photo_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, RecordedCall::Photo { .. }))
            .count()
    }

    fn outcome(&self) -> Delivery {
        match &self.fail_with {
            Some(reason) => Delivery::failed(reason.clone()),
            None => Delivery::Sent,
        }
    }
}

impl Notifier for RecordingNotifier {
    fn send_message(&self, text: &str) -> Delivery {
        self.calls.borrow_mut().push(RecordedCall::Message {
            text: text.to_string(),
        });
        self.outcome()
    }

    fn send_photo(&self, image: &DynamicImage, caption: &str) -> Delivery {
        self.calls.borrow_mut().push(RecordedCall::Photo {
            caption: caption.to_string(),
            width: image.width(),
            height: image.height(),
        });
        self.outcome()
    }
}
