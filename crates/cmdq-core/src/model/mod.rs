pub mod command;
pub mod status;

pub use command::{CommandPatch, CommandRecord};
pub use status::CommandStatus;
