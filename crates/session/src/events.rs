//! Notifications sent from a session to its front end.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use coverreel_image_store::ImageStatus;

/// A state change the presentation layer may want to render.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The stored cover changed (stored, replaced, deleted, or first loaded).
    ImageChanged(ImageStatus),

    /// The selected audio changed; `None` when cleared.
    AudioChanged(Option<String>),

    /// A production started (`true`) or finished (`false`).
    BusyChanged(bool),

    /// Encode progress in [0.0, 1.0].
    Progress(f64),

    /// One line of engine output.
    Log(String),

    /// User-facing progress message.
    Status(String),

    /// A video was produced and is available for download.
    Completed { file_name: String, bytes: usize },

    /// An operation failed or was rejected. `message` is user-facing.
    Failed { kind: &'static str, message: String },
}

/// Channel pair carrying session events.
pub fn event_channel() -> (UnboundedSender<SessionEvent>, UnboundedReceiver<SessionEvent>) {
    mpsc::unbounded_channel()
}
