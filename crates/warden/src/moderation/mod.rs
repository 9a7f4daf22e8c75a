//! Inbound message moderation: cooldown, captcha gate, stop-words.

mod gate;
mod stopwords;

pub use gate::{GateAction, ModerationGate};
pub use stopwords::StopWordFilter;
