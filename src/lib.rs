//! SMS Code Relay: verification-code pipeline core.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod intake;
pub mod interactive;
pub mod logging;
pub mod pipeline;
pub mod settings;
pub mod store;
