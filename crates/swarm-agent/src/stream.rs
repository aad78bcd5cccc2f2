use serde::{Deserialize, Serialize};

/// Events emitted during a streamed generation.
///
/// A stream is finite and cannot be restarted: zero or more `TextDelta`
/// events, then either `Done` or `Error`. The aggregated response arrives
/// through the join handle returned alongside the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of generated text.
    TextDelta { text: String },

    /// The stream has finished successfully.
    Done,

    /// The stream failed part-way.
    Error { message: String },
}
