//! Per (user, chat) state tracking on top of the store.
//!
//! Tracks captcha progress and the last accepted message time.

mod captcha;
mod cooldown;

pub use captcha::CaptchaTracker;
pub use cooldown::CooldownTracker;
