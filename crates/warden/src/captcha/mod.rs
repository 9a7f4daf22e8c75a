//! Math captcha for new and unverified speakers.
//!
//! A challenge is a two-operand addition with four buttons. The engine owns
//! the per-(user, chat) lifecycle: issue, answer, timeout ban.

mod callback;
mod engine;
mod generator;
mod verifier;

pub use callback::CaptchaCallback;
pub use engine::{CaptchaEngine, IssueOutcome, IssueTrigger};
pub use generator::Challenge;
pub use verifier::expected_answer;
