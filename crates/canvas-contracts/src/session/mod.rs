mod command_parser;
mod command_registry;

pub use command_parser::{parse_command, DownloadTarget, SeedUpdate, SessionCommand, Toggle};
pub use command_registry::SESSION_HELP_COMMANDS;
