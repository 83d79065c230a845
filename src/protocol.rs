//! Cross-context message protocol.
//!
//! JSON messages between the page engine and the extension's UI
//! surfaces, tagged on `action`. Field names are part of the wire
//! contract with deployed surfaces, so the serde attributes here are
//! load-bearing; the tests pin the exact encodings. Delivery is
//! per-channel FIFO and nothing more: a response may arrive after the
//! requesting surface is gone, and senders swallow that failure rather
//! than escalating it.

use serde::{Deserialize, Serialize};

/// Requests the page engine answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Insert prompt text into the page's chat input.
    InsertPrompt { content: String },
    /// Read the current chat input text, trimmed.
    GetTextareaContent,
}

/// Answers to [`Request`]s. Shapes are distinct, so the wire carries
/// them untagged, exactly as the surfaces expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Insert { success: bool },
    Content { content: String },
}

/// Messages the page engine sends on its own initiative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Outbound {
    /// Affordance clicked; open the prompt library.
    OpenPopup,
}
