pub mod agents;
pub mod config;
pub mod dag;
pub mod errors;
pub mod executor;
pub mod extract;
pub mod init;
pub mod logging;
pub mod orchestrator;
pub mod phase;
pub mod plan;
pub mod registry;
pub mod report;
pub mod settings;
pub mod storage;
pub mod ui;
