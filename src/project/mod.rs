//! Inspecting and configuring the project being installed into.

pub mod configure;
pub mod detect;
pub mod env_files;
