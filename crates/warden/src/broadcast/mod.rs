//! Bulk distribution: pin-and-send, autoposting, bulk unpin.

mod autopost;
mod pin;

pub use autopost::{
    AutopostInfo, AutopostInterval, AutopostRegistry, AutopostSpec, Targets, autopost_worker,
    parse_targets,
};
pub use pin::Broadcaster;
