mod coordinator;
mod registry_command;

pub use coordinator::*;
pub use registry_command::*;
