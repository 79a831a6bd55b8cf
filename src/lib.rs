pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod service;
pub mod ui;
