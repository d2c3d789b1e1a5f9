pub mod agent;
pub mod api;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod events;
pub mod platform;
pub mod project;
pub mod render;
pub mod shutdown;
pub mod workflow;
pub mod workspace;
