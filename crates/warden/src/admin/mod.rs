//! Admin command surface.

mod commands;
mod handler;

pub use commands::AdminCommand;
pub use handler::{CommandContext, HELP, execute};
