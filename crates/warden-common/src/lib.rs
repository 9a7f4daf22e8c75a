//! # Warden Common
//!
//! Shared types, errors, and constants used across Warden components.
//!
//! ## Modules
//! - `types` - Core records (ChatSettings, CaptchaStatus, MemberStatus, etc.)
//! - `error` - Common error types
//! - `constants` - Defaults, bounds, and Redis key prefixes

pub mod constants;
pub mod error;
pub mod types;

pub use error::WardenError;
pub use types::*;
