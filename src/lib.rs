pub mod annotations;
pub mod cli;
pub mod config;
pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod source;
pub mod state_machine;
pub mod store;
pub mod translator;
pub mod ui;
pub mod validate;
