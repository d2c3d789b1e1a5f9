//! The authentication service: CLI session, device login and credential
//! endpoints.

pub mod client;
pub mod device;
pub mod session;

pub use client::ApiClient;
pub use session::{Session, SessionStore};
