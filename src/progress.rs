//! Progress streaming over an in-process channel.
//!
//! The pipeline emits zero or more `Status` events followed by exactly one
//! `Final` event per handled query. Emission is best effort: a dropped
//! receiver never fails the pipeline.

use tokio::sync::mpsc;

use crate::types::ResponsePayload;

/// An event on the progress channel.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Human-readable progress line.
    Status { message: String },
    /// The terminal answer for the query.
    Final { payload: ResponsePayload },
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Create a fresh progress channel.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Send a status line, ignoring a closed channel.
pub fn emit_status(sender: &ProgressSender, message: impl Into<String>) {
    let _ = sender.send(ProgressEvent::Status {
        message: message.into(),
    });
}

/// Send the final payload, ignoring a closed channel.
pub fn emit_final(sender: &ProgressSender, payload: ResponsePayload) {
    let _ = sender.send(ProgressEvent::Final { payload });
}
