mod commands;
mod listener;

pub use commands::{handle_command, Command};
pub use listener::CommandListener;
