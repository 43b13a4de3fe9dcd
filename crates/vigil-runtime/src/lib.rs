//! Vigil Runtime - Launching supervised services

pub mod cmd;
pub mod traits;

pub use cmd::CmdLauncher;
pub use traits::{LaunchedProcess, Launcher};
