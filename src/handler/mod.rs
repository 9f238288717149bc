//! Request handling: command recognition, dispatch and reply building.

mod dispatcher;
pub mod sysinfo;

pub use dispatcher::{Command, Dispatcher};
